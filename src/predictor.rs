//! Match outcome probabilities from a truncated grid of independent Poisson scorelines.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::config::{ModelConfig, RoleDefault};
use crate::model_state::ModelSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scoreline {
    pub home: u32,
    pub away: u32,
}

impl fmt::Display for Scoreline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

impl Serialize for Scoreline {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutcomeProbs {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub home_prob: f64,
    pub draw_prob: f64,
    pub away_prob: f64,
    pub expected_goals_home: f64,
    pub expected_goals_away: f64,
    pub expected_goals_total: f64,
    pub over_2_5_prob: f64,
    pub both_teams_score_prob: f64,
    pub most_likely_score: Scoreline,
    pub confidence: f64,
    pub predicted_outcome: Outcome,
}

impl PredictionResult {
    pub fn probs(&self) -> OutcomeProbs {
        OutcomeProbs {
            home: self.home_prob,
            draw: self.draw_prob,
            away: self.away_prob,
        }
    }
}

/// Probabilities of 0..max_k goals. The tail beyond `max_k` is left out.
pub fn poisson_pmf(lambda: f64, max_k: u32) -> Vec<f64> {
    let lambda = lambda.max(0.0);
    let mut out = Vec::with_capacity(max_k as usize + 1);
    out.push((-lambda).exp());
    for k in 1..=max_k as usize {
        let prev = out[k - 1];
        out.push(prev * lambda / k as f64);
    }
    out
}

pub fn poisson_cdf(k: u32, lambda: f64) -> f64 {
    poisson_pmf(lambda, k).iter().sum()
}

/// Mass missing from a `max_goals` x `max_goals` grid.
pub fn truncation_residual(lambda_home: f64, lambda_away: f64, max_goals: u32) -> f64 {
    if max_goals == 0 {
        return 1.0;
    }
    1.0 - poisson_cdf(max_goals - 1, lambda_home) * poisson_cdf(max_goals - 1, lambda_away)
}

/// Home first, then draw over away.
pub fn predicted_outcome(home: f64, draw: f64, away: f64) -> Outcome {
    if home > draw && home > away {
        Outcome::Home
    } else if draw > away {
        Outcome::Draw
    } else {
        Outcome::Away
    }
}

#[derive(Debug, Clone)]
pub struct OutcomePredictor {
    config: ModelConfig,
}

impl OutcomePredictor {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    /// Expected goals for each side before any grid is built.
    pub fn lambdas(
        &self,
        snapshot: &ModelSnapshot,
        home_team: &str,
        away_team: &str,
        league: Option<&str>,
    ) -> (f64, f64) {
        let cfg = &self.config;
        let home = role_strength(snapshot, home_team, cfg.unknown_home);
        let away = role_strength(snapshot, away_team, cfg.unknown_away);
        let league_factor = league
            .and_then(|name| snapshot.league_factor(name))
            .unwrap_or(1.0);

        let lambda_home = home.attack * away.defense * cfg.home_advantage * league_factor;
        let lambda_away = away.attack * home.defense * league_factor;
        (
            lambda_home.clamp(cfg.lambda_min, cfg.lambda_max),
            lambda_away.clamp(cfg.lambda_min, cfg.lambda_max),
        )
    }

    pub fn predict(
        &self,
        snapshot: &ModelSnapshot,
        home_team: &str,
        away_team: &str,
        league: Option<&str>,
    ) -> PredictionResult {
        let (lambda_home, lambda_away) = self.lambdas(snapshot, home_team, away_team, league);
        self.from_lambdas(lambda_home, lambda_away)
    }

    pub fn from_lambdas(&self, lambda_home: f64, lambda_away: f64) -> PredictionResult {
        let max_goals = self.config.max_goals.max(3);
        let pmf_h = poisson_pmf(lambda_home, max_goals);
        let pmf_a = poisson_pmf(lambda_away, max_goals);

        let grid = self.config.max_goals as usize;
        let mut home_prob = 0.0;
        let mut draw_prob = 0.0;
        let mut away_prob = 0.0;
        for (i, p_i) in pmf_h.iter().take(grid).enumerate() {
            for (j, p_j) in pmf_a.iter().take(grid).enumerate() {
                let p = p_i * p_j;
                if i > j {
                    home_prob += p;
                } else if i == j {
                    draw_prob += p;
                } else {
                    away_prob += p;
                }
            }
        }

        let mut under = 0.0;
        for i in 0..3 {
            for j in 0..3 - i {
                under += pmf_h[i] * pmf_a[j];
            }
        }
        let over_2_5_prob = (1.0 - under).clamp(0.0, 1.0);

        let (zero_h, zero_a) = (pmf_h[0], pmf_a[0]);
        let both_teams_score_prob = (1.0 - (zero_h + zero_a - zero_h * zero_a)).clamp(0.0, 1.0);

        let most_likely_score = Scoreline {
            home: lambda_home.round() as u32,
            away: lambda_away.round() as u32,
        };

        let confidence = home_prob.max(draw_prob).max(away_prob).clamp(0.0, 1.0);

        PredictionResult {
            home_prob,
            draw_prob,
            away_prob,
            expected_goals_home: lambda_home,
            expected_goals_away: lambda_away,
            expected_goals_total: lambda_home + lambda_away,
            over_2_5_prob,
            both_teams_score_prob,
            most_likely_score,
            confidence,
            predicted_outcome: predicted_outcome(home_prob, draw_prob, away_prob),
        }
    }
}

fn role_strength(snapshot: &ModelSnapshot, team: &str, fallback: RoleDefault) -> RoleDefault {
    match snapshot.team(team) {
        Some(s) => RoleDefault {
            attack: s.attack,
            defense: s.defense,
        },
        None => fallback,
    }
}
