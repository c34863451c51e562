//! Read-only summaries of the match table. Individual rows are never loaded.

use rusqlite::params;
use serde::Serialize;
use tracing::debug;

use super::manager::ConnectionManager;
use super::row::{Fetch, Row};
use crate::error::StoreError;

const LEAGUE_SQL: &str = r#"
    SELECT
        TRIM(competition_name, char(32, 9, 10, 13)) AS competition_name,
        COUNT(*) AS match_count,
        AVG(home_score + away_score) AS avg_total_goals,
        AVG(home_score) AS avg_home_goals,
        AVG(away_score) AS avg_away_goals
    FROM matches
    WHERE home_score IS NOT NULL
      AND away_score IS NOT NULL
      AND competition_name IS NOT NULL
    GROUP BY TRIM(competition_name, char(32, 9, 10, 13))
    HAVING COUNT(*) >= ?1
"#;

const TEAM_SQL: &str = r#"
    SELECT
        team_name,
        SUM(played) AS total_matches,
        SUM(goals_for) AS total_goals_for,
        SUM(goals_against) AS total_goals_against
    FROM (
        SELECT
            TRIM(home_team, char(32, 9, 10, 13)) AS team_name,
            COUNT(*) AS played,
            SUM(home_score) AS goals_for,
            SUM(away_score) AS goals_against
        FROM matches
        WHERE home_score IS NOT NULL AND away_score IS NOT NULL
        GROUP BY TRIM(home_team, char(32, 9, 10, 13))

        UNION ALL

        SELECT
            TRIM(away_team, char(32, 9, 10, 13)) AS team_name,
            COUNT(*) AS played,
            SUM(away_score) AS goals_for,
            SUM(home_score) AS goals_against
        FROM matches
        WHERE home_score IS NOT NULL AND away_score IS NOT NULL
        GROUP BY TRIM(away_team, char(32, 9, 10, 13))
    )
    GROUP BY team_name
    HAVING SUM(played) >= ?1
"#;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeagueAggregate {
    pub league: String,
    pub matches: u32,
    pub avg_total_goals: f64,
    pub avg_home_goals: f64,
    pub avg_away_goals: f64,
}

impl LeagueAggregate {
    pub fn from_row(row: &Row) -> Option<Self> {
        let league = row.get_text("competition_name")?.trim();
        if league.is_empty() {
            return None;
        }
        Some(Self {
            league: league.to_string(),
            matches: u32::try_from(row.get_i64("match_count")?).ok()?,
            avg_total_goals: row.get_f64("avg_total_goals")?,
            avg_home_goals: row.get_f64("avg_home_goals").unwrap_or(0.0),
            avg_away_goals: row.get_f64("avg_away_goals").unwrap_or(0.0),
        })
    }
}

/// Goal totals across every appearance of one team, home and away.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamAggregate {
    pub team: String,
    pub matches: u32,
    pub goals_for: f64,
    pub goals_against: f64,
}

impl TeamAggregate {
    pub fn from_row(row: &Row) -> Option<Self> {
        let team = row.get_text("team_name")?.trim();
        if team.is_empty() {
            return None;
        }
        Some(Self {
            team: team.to_string(),
            matches: u32::try_from(row.get_i64("total_matches")?).ok()?,
            goals_for: row.get_f64("total_goals_for").unwrap_or(0.0),
            goals_against: row.get_f64("total_goals_against").unwrap_or(0.0),
        })
    }
}

pub fn fetch_league_aggregates(
    manager: &ConnectionManager,
    min_matches: u32,
) -> Result<Vec<LeagueAggregate>, StoreError> {
    let rows = manager
        .execute(LEAGUE_SQL, params![min_matches], Fetch::All)?
        .into_rows();
    Ok(decode(rows, LeagueAggregate::from_row, "league")
        .into_iter()
        .filter(|agg| agg.matches >= min_matches)
        .collect())
}

pub fn fetch_team_aggregates(
    manager: &ConnectionManager,
    min_matches: u32,
) -> Result<Vec<TeamAggregate>, StoreError> {
    let rows = manager
        .execute(TEAM_SQL, params![min_matches], Fetch::All)?
        .into_rows();
    Ok(decode(rows, TeamAggregate::from_row, "team")
        .into_iter()
        .filter(|agg| agg.matches >= min_matches)
        .collect())
}

fn decode<T>(rows: Vec<Row>, f: impl Fn(&Row) -> Option<T>, what: &str) -> Vec<T> {
    let total = rows.len();
    let out = rows.iter().filter_map(f).collect::<Vec<_>>();
    if out.len() != total {
        debug!(kind = what, skipped = total - out.len(), "ignored malformed aggregate rows");
    }
    out
}

pub fn count_matches(manager: &ConnectionManager) -> Result<u64, StoreError> {
    count(manager, "SELECT COUNT(*) AS n FROM matches")
}

pub fn count_scored_matches(manager: &ConnectionManager) -> Result<u64, StoreError> {
    count(
        manager,
        "SELECT COUNT(*) AS n FROM matches WHERE home_score IS NOT NULL AND away_score IS NOT NULL",
    )
}

fn count(manager: &ConnectionManager, sql: &str) -> Result<u64, StoreError> {
    let n = manager
        .execute(sql, &[], Fetch::One)?
        .into_row()
        .and_then(|row| row.get_i64("n"))
        .unwrap_or(0);
    Ok(u64::try_from(n).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;

    #[test]
    fn league_row_without_name_is_ignored() {
        let row = Row::from_pairs([
            ("competition_name".to_string(), Value::Null),
            ("match_count".to_string(), Value::Integer(40)),
            ("avg_total_goals".to_string(), Value::Real(2.8)),
        ]);
        assert!(LeagueAggregate::from_row(&row).is_none());
    }

    #[test]
    fn team_row_decodes_integer_sums() {
        let row = Row::from_pairs([
            ("team_name".to_string(), Value::Text("Nantes".to_string())),
            ("total_matches".to_string(), Value::Integer(30)),
            ("total_goals_for".to_string(), Value::Integer(45)),
            ("total_goals_against".to_string(), Value::Integer(30)),
        ]);
        let agg = TeamAggregate::from_row(&row).unwrap();
        assert_eq!(agg.team, "Nantes");
        assert_eq!(agg.matches, 30);
        assert_eq!(agg.goals_for, 45.0);
        assert_eq!(agg.goals_against, 30.0);
    }
}
