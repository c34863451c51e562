//! Shared model snapshot, swapped whole on every successful training run.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::strength::{LeagueEffect, TeamStrength};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelSnapshot {
    pub trained: bool,
    pub trained_at: Option<DateTime<Utc>>,
    pub team_strengths: HashMap<String, TeamStrength>,
    pub league_effects: HashMap<String, LeagueEffect>,
}

impl ModelSnapshot {
    pub fn untrained() -> Self {
        Self::default()
    }

    pub fn trained(
        team_strengths: HashMap<String, TeamStrength>,
        league_effects: HashMap<String, LeagueEffect>,
        trained_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trained: true,
            trained_at: Some(trained_at),
            team_strengths,
            league_effects,
        }
    }

    pub fn team(&self, name: &str) -> Option<&TeamStrength> {
        self.team_strengths.get(name.trim())
    }

    pub fn league_factor(&self, league: &str) -> Option<f64> {
        self.league_effects.get(league.trim()).map(|l| l.goal_factor)
    }

    pub fn summary(&self, top_n: usize) -> ModelSummary {
        let mut by_attack = self.team_strengths.values().collect::<Vec<_>>();
        by_attack.sort_by(|a, b| {
            b.attack
                .total_cmp(&a.attack)
                .then_with(|| a.team.cmp(&b.team))
        });

        // Lower conceding rate is the stronger defense.
        let mut by_defense = self.team_strengths.values().collect::<Vec<_>>();
        by_defense.sort_by(|a, b| {
            a.defense
                .total_cmp(&b.defense)
                .then_with(|| a.team.cmp(&b.team))
        });

        let mut leagues = self.league_effects.keys().cloned().collect::<Vec<_>>();
        leagues.sort();

        ModelSummary {
            trained: self.trained,
            trained_at: self.trained_at,
            team_count: self.team_strengths.len(),
            league_count: self.league_effects.len(),
            top_attack: by_attack.into_iter().take(top_n).cloned().collect(),
            top_defense: by_defense.into_iter().take(top_n).cloned().collect(),
            leagues,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub trained: bool,
    pub trained_at: Option<DateTime<Utc>>,
    pub team_count: usize,
    pub league_count: usize,
    pub top_attack: Vec<TeamStrength>,
    pub top_defense: Vec<TeamStrength>,
    pub leagues: Vec<String>,
}

/// Holder of the current snapshot. Readers clone the `Arc`; writers replace it.
#[derive(Debug, Default)]
pub struct ModelStore {
    current: RwLock<Arc<ModelSnapshot>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Installs `next` and returns the snapshot it replaced.
    pub fn replace(&self, next: ModelSnapshot) -> Arc<ModelSnapshot> {
        let next = Arc::new(next);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    pub fn is_trained(&self) -> bool {
        self.snapshot().trained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strength(team: &str, attack: f64, defense: f64) -> TeamStrength {
        TeamStrength {
            team: team.to_string(),
            attack,
            defense,
            matches_played: 30,
            confidence: 1.0,
        }
    }

    #[test]
    fn replace_swaps_whole_snapshot() {
        let store = ModelStore::new();
        let before = store.snapshot();
        assert!(!before.trained);

        let mut teams = HashMap::new();
        teams.insert("Lens".to_string(), strength("Lens", 1.8, 1.1));
        let prev = store.replace(ModelSnapshot::trained(teams, HashMap::new(), Utc::now()));

        assert!(!prev.trained);
        assert!(store.is_trained());
        // Readers holding the old Arc keep a consistent view.
        assert!(before.team("Lens").is_none());
        assert!(store.snapshot().team("Lens").is_some());
    }

    #[test]
    fn summary_orders_attack_desc_and_defense_asc() {
        let mut teams = HashMap::new();
        for s in [
            strength("A", 1.2, 1.6),
            strength("B", 2.1, 0.9),
            strength("C", 1.7, 1.2),
        ] {
            teams.insert(s.team.clone(), s);
        }
        let snap = ModelSnapshot::trained(teams, HashMap::new(), Utc::now());
        let summary = snap.summary(2);
        assert_eq!(summary.team_count, 3);
        assert_eq!(
            summary
                .top_attack
                .iter()
                .map(|t| t.team.as_str())
                .collect::<Vec<_>>(),
            vec!["B", "C"]
        );
        assert_eq!(
            summary
                .top_defense
                .iter()
                .map(|t| t.team.as_str())
                .collect::<Vec<_>>(),
            vec!["B", "C"]
        );
    }
}
