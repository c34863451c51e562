use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::manager::ConnectionManager;
use crate::error::StoreError;

const SCHEMA: &str = r#"
    PRAGMA journal_mode = WAL;
    CREATE TABLE IF NOT EXISTS matches (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        competition_name TEXT NULL,
        match_date TEXT NOT NULL,
        home_team TEXT NOT NULL,
        away_team TEXT NOT NULL,
        home_score INTEGER NULL,
        away_score INTEGER NULL,
        home_xg REAL NULL,
        away_xg REAL NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (competition_name, match_date, home_team, away_team)
    );
    CREATE INDEX IF NOT EXISTS idx_matches_competition ON matches(competition_name);
    CREATE INDEX IF NOT EXISTS idx_matches_home_team ON matches(home_team);
    CREATE INDEX IF NOT EXISTS idx_matches_away_team ON matches(away_team);

    CREATE TABLE IF NOT EXISTS predictions (
        match_id INTEGER PRIMARY KEY,
        home_win_prob REAL NOT NULL,
        draw_prob REAL NOT NULL,
        away_win_prob REAL NOT NULL,
        confidence REAL NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NULL
    );
"#;

pub fn init_schema(manager: &ConnectionManager) -> Result<(), StoreError> {
    let conn = manager.acquire()?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// One historical fixture as written by the importers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRow {
    pub competition: Option<String>,
    pub match_date: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub home_xg: Option<f64>,
    pub away_xg: Option<f64>,
}

impl MatchRow {
    pub fn scored(
        competition: &str,
        match_date: &str,
        home_team: &str,
        away_team: &str,
        home_score: u32,
        away_score: u32,
    ) -> Self {
        Self {
            competition: Some(competition.to_string()),
            match_date: match_date.to_string(),
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home_score: Some(home_score),
            away_score: Some(away_score),
            home_xg: None,
            away_xg: None,
        }
    }
}

const UPSERT_MATCH_SQL: &str = r#"
    INSERT INTO matches (
        competition_name, match_date, home_team, away_team,
        home_score, away_score, home_xg, away_xg, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(competition_name, match_date, home_team, away_team) DO UPDATE SET
        home_score = excluded.home_score,
        away_score = excluded.away_score,
        home_xg = excluded.home_xg,
        away_xg = excluded.away_xg,
        updated_at = excluded.updated_at
"#;

/// Inserts or refreshes a fixture keyed by (competition, date, home, away).
pub fn upsert_match(manager: &ConnectionManager, m: &MatchRow) -> Result<usize, StoreError> {
    let out = manager.execute_write(
        UPSERT_MATCH_SQL,
        params![
            m.competition,
            m.match_date,
            m.home_team,
            m.away_team,
            m.home_score,
            m.away_score,
            m.home_xg,
            m.away_xg,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(out.affected())
}

/// Upserts a batch on one leased connection inside a single transaction.
pub fn upsert_matches(manager: &ConnectionManager, rows: &[MatchRow]) -> Result<usize, StoreError> {
    let mut conn = manager.acquire()?;
    let tx = conn.transaction()?;
    let updated_at = Utc::now().to_rfc3339();
    let mut written = 0usize;
    {
        let mut stmt = tx.prepare_cached(UPSERT_MATCH_SQL)?;
        for m in rows {
            written += stmt.execute(params![
                m.competition,
                m.match_date,
                m.home_team,
                m.away_team,
                m.home_score,
                m.away_score,
                m.home_xg,
                m.away_xg,
                updated_at,
            ])?;
        }
    }
    tx.commit().map_err(StoreError::Commit)?;
    Ok(written)
}
