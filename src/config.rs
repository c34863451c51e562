use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Connection limits and retry timings for the match store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    /// Zero disables pooling; every call then opens its own connection.
    pub pool_size: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub too_many_cooldown: Duration,
    pub min_acquire_interval: Duration,
    pub pool_wait: Duration,
    pub busy_timeout: Duration,
    pub execute_timeout: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/matches.sqlite"),
            pool_size: 3,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            too_many_cooldown: Duration::from_secs(5),
            min_acquire_interval: Duration::from_millis(100),
            pool_wait: Duration::from_secs(2),
            busy_timeout: Duration::from_secs(10),
            execute_timeout: None,
        }
    }
}

/// Attack/defense pair used when a team has no trained strength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoleDefault {
    pub attack: f64,
    pub defense: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub prior_alpha: f64,
    pub prior_beta: f64,
    /// Rate sparse teams are shrunk toward.
    pub prior_mean: f64,
    /// Average goals per match that maps to a league factor of 1.0.
    pub goal_baseline: f64,
    pub home_advantage: f64,
    /// Scorelines 0..max_goals per side are enumerated.
    pub max_goals: u32,
    pub min_league_matches: u32,
    pub min_team_matches: u32,
    pub confidence_saturation: u32,
    pub lambda_min: f64,
    pub lambda_max: f64,
    pub unknown_home: RoleDefault,
    pub unknown_away: RoleDefault,
    pub warm_start_min_matches: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            prior_alpha: 1.5,
            prior_beta: 1.5,
            prior_mean: 1.5,
            goal_baseline: 2.5,
            home_advantage: 1.148,
            max_goals: 6,
            min_league_matches: 10,
            min_team_matches: 5,
            confidence_saturation: 30,
            lambda_min: 0.5,
            lambda_max: 5.0,
            unknown_home: RoleDefault {
                attack: 1.5,
                defense: 1.5,
            },
            unknown_away: RoleDefault {
                attack: 1.3,
                defense: 1.3,
            },
            warm_start_min_matches: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub model: ModelConfig,
}

/// Reads `.env.local` then `.env`; already-set variables win.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store_defaults = StoreConfig::default();
        let model_defaults = ModelConfig::default();

        let db_path = lookup("FORECAST_DB_PATH")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from)
            .unwrap_or(store_defaults.db_path);

        let store = StoreConfig {
            db_path,
            pool_size: parse_or(&lookup, "FORECAST_POOL_SIZE", store_defaults.pool_size)?,
            max_retries: parse_or(&lookup, "FORECAST_MAX_RETRIES", store_defaults.max_retries)?,
            retry_delay: millis_or(&lookup, "FORECAST_RETRY_DELAY_MS", store_defaults.retry_delay)?,
            too_many_cooldown: millis_or(
                &lookup,
                "FORECAST_TOO_MANY_COOLDOWN_MS",
                store_defaults.too_many_cooldown,
            )?,
            min_acquire_interval: millis_or(
                &lookup,
                "FORECAST_MIN_ACQUIRE_INTERVAL_MS",
                store_defaults.min_acquire_interval,
            )?,
            pool_wait: millis_or(&lookup, "FORECAST_POOL_WAIT_MS", store_defaults.pool_wait)?,
            busy_timeout: millis_or(
                &lookup,
                "FORECAST_BUSY_TIMEOUT_MS",
                store_defaults.busy_timeout,
            )?,
            execute_timeout: match lookup("FORECAST_EXECUTE_TIMEOUT_MS") {
                Some(raw) if !raw.trim().is_empty() => Some(Duration::from_millis(parse_value(
                    "FORECAST_EXECUTE_TIMEOUT_MS",
                    &raw,
                )?)),
                _ => None,
            },
        };

        let model = ModelConfig {
            prior_alpha: parse_or(&lookup, "FORECAST_PRIOR_ALPHA", model_defaults.prior_alpha)?,
            prior_beta: parse_or(&lookup, "FORECAST_PRIOR_BETA", model_defaults.prior_beta)?,
            home_advantage: parse_or(
                &lookup,
                "FORECAST_HOME_ADVANTAGE",
                model_defaults.home_advantage,
            )?,
            max_goals: parse_or(&lookup, "FORECAST_MAX_GOALS", model_defaults.max_goals)?,
            ..model_defaults
        };

        let config = Self { store, model };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.model;
        if !(m.prior_alpha > 0.0) {
            return Err(ConfigError::OutOfRange {
                key: "FORECAST_PRIOR_ALPHA",
                expected: "strictly positive",
            });
        }
        if !(m.prior_beta > 0.0) {
            return Err(ConfigError::OutOfRange {
                key: "FORECAST_PRIOR_BETA",
                expected: "strictly positive",
            });
        }
        if !(m.home_advantage > 0.0) {
            return Err(ConfigError::OutOfRange {
                key: "FORECAST_HOME_ADVANTAGE",
                expected: "strictly positive",
            });
        }
        if m.max_goals == 0 {
            return Err(ConfigError::OutOfRange {
                key: "FORECAST_MAX_GOALS",
                expected: "at least 1",
            });
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => parse_value(key, &raw),
        _ => Ok(default),
    }
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => Ok(Duration::from_millis(parse_value(key, &raw)?)),
        _ => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.store.pool_size, 3);
        assert_eq!(cfg.store.max_retries, 3);
        assert_eq!(cfg.model.max_goals, 6);
        assert!((cfg.model.home_advantage - 1.148).abs() < 1e-12);
        assert!(cfg.store.execute_timeout.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("FORECAST_DB_PATH", " /tmp/x.sqlite "),
            ("FORECAST_POOL_SIZE", "1"),
            ("FORECAST_RETRY_DELAY_MS", "15"),
            ("FORECAST_EXECUTE_TIMEOUT_MS", "250"),
            ("FORECAST_PRIOR_ALPHA", "2.0"),
        ]))
        .unwrap();
        assert_eq!(cfg.store.db_path, PathBuf::from("/tmp/x.sqlite"));
        assert_eq!(cfg.store.pool_size, 1);
        assert_eq!(cfg.store.retry_delay, Duration::from_millis(15));
        assert_eq!(cfg.store.execute_timeout, Some(Duration::from_millis(250)));
        assert_eq!(cfg.model.prior_alpha, 2.0);
        assert_eq!(cfg.model.prior_beta, 1.5);
    }

    #[test]
    fn garbage_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("FORECAST_MAX_RETRIES", "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "FORECAST_MAX_RETRIES",
                ..
            }
        ));

        let err =
            AppConfig::from_lookup(lookup_from(&[("FORECAST_PRIOR_BETA", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }
}
