//! Shrinkage estimates of team scoring/conceding rates and league goal factors.
//!
//! Each team rate is the posterior mean of a Gamma-Poisson model, blended toward
//! the prior mean in proportion to how few matches back it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::error::StoreError;
use crate::model_state::{ModelSnapshot, ModelStore};
use crate::store::ConnectionManager;
use crate::store::aggregates::{
    LeagueAggregate, TeamAggregate, fetch_league_aggregates, fetch_team_aggregates,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStrength {
    pub team: String,
    pub attack: f64,
    pub defense: f64,
    pub matches_played: u32,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueEffect {
    pub league: String,
    pub goal_factor: f64,
    pub match_count: u32,
}

/// Outcome of one training run. Training never returns an error to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitReport {
    Trained {
        teams: usize,
        leagues: usize,
        trained_at: DateTime<Utc>,
    },
    InsufficientData {
        leagues: usize,
    },
    Failed {
        reason: String,
        model_trained: bool,
    },
}

impl FitReport {
    pub fn is_trained(&self) -> bool {
        matches!(self, FitReport::Trained { .. })
    }
}

/// Saturating share of full trust in a team's own data.
pub fn shrinkage_confidence(matches: u32, saturation: u32) -> f64 {
    if saturation == 0 {
        return 1.0;
    }
    (f64::from(matches) / f64::from(saturation)).min(1.0)
}

pub fn posterior_rate(prior_alpha: f64, prior_beta: f64, total: f64, matches: u32) -> f64 {
    (prior_alpha + total) / (prior_beta + f64::from(matches))
}

pub fn shrink(rate: f64, confidence: f64, prior_mean: f64) -> f64 {
    confidence * rate + (1.0 - confidence) * prior_mean
}

#[derive(Debug, Clone)]
pub struct StrengthEstimator {
    config: ModelConfig,
}

impl StrengthEstimator {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn league_effect(&self, agg: &LeagueAggregate) -> Option<LeagueEffect> {
        if agg.matches < self.config.min_league_matches {
            return None;
        }
        let goal_factor = if agg.avg_total_goals.is_finite() && agg.avg_total_goals > 0.0 {
            agg.avg_total_goals / self.config.goal_baseline
        } else {
            1.0
        };
        Some(LeagueEffect {
            league: agg.league.clone(),
            goal_factor,
            match_count: agg.matches,
        })
    }

    pub fn team_strength(&self, agg: &TeamAggregate) -> Option<TeamStrength> {
        let cfg = &self.config;
        if agg.matches < cfg.min_team_matches {
            return None;
        }
        let n = agg.matches;
        let confidence = shrinkage_confidence(n, cfg.confidence_saturation);
        let attack = posterior_rate(cfg.prior_alpha, cfg.prior_beta, agg.goals_for.max(0.0), n);
        let defense =
            posterior_rate(cfg.prior_alpha, cfg.prior_beta, agg.goals_against.max(0.0), n);

        Some(TeamStrength {
            team: agg.team.clone(),
            attack: shrink(attack, confidence, cfg.prior_mean),
            defense: shrink(defense, confidence, cfg.prior_mean),
            matches_played: n,
            confidence,
        })
    }

    pub fn estimate(
        &self,
        leagues: &[LeagueAggregate],
        teams: &[TeamAggregate],
    ) -> (HashMap<String, TeamStrength>, HashMap<String, LeagueEffect>) {
        let league_effects = leagues
            .iter()
            .filter_map(|agg| self.league_effect(agg))
            .map(|effect| (effect.league.clone(), effect))
            .collect::<HashMap<_, _>>();

        let team_strengths = teams
            .par_iter()
            .filter_map(|agg| self.team_strength(agg))
            .map(|strength| (strength.team.clone(), strength))
            .collect::<HashMap<_, _>>();

        (team_strengths, league_effects)
    }

    /// Rebuilds the model from the store aggregates and installs it in `model`.
    /// A failed run leaves whatever snapshot was installed before.
    pub fn fit(&self, manager: &ConnectionManager, model: &ModelStore) -> FitReport {
        info!("model training started");
        let (leagues, teams) = match self.load_aggregates(manager) {
            Ok(aggregates) => aggregates,
            Err(err) => {
                let model_trained = model.is_trained();
                warn!(error = %err, model_trained, "model training failed");
                return FitReport::Failed {
                    reason: err.to_string(),
                    model_trained,
                };
            }
        };

        let (team_strengths, league_effects) = self.estimate(&leagues, &teams);
        if team_strengths.is_empty() {
            warn!(
                leagues = league_effects.len(),
                min_team_matches = self.config.min_team_matches,
                "no team has enough matches, model left untrained"
            );
            model.replace(ModelSnapshot::untrained());
            return FitReport::InsufficientData {
                leagues: league_effects.len(),
            };
        }

        let trained_at = Utc::now();
        let report = FitReport::Trained {
            teams: team_strengths.len(),
            leagues: league_effects.len(),
            trained_at,
        };
        model.replace(ModelSnapshot::trained(
            team_strengths,
            league_effects,
            trained_at,
        ));
        info!(?report, "model training finished");
        report
    }

    fn load_aggregates(
        &self,
        manager: &ConnectionManager,
    ) -> Result<(Vec<LeagueAggregate>, Vec<TeamAggregate>), StoreError> {
        let leagues = fetch_league_aggregates(manager, self.config.min_league_matches)?;
        let teams = fetch_team_aggregates(manager, self.config.min_team_matches)?;
        Ok((leagues, teams))
    }
}
