use std::sync::Arc;

use chrono::Utc;
use rusqlite::params;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::predictor::OutcomeProbs;
use crate::store::{ConnectionManager, Fetch, Row};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredPrediction {
    pub match_id: i64,
    pub home_win_prob: f64,
    pub draw_prob: f64,
    pub away_win_prob: f64,
    pub confidence: f64,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl StoredPrediction {
    fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            match_id: row.get_i64("match_id")?,
            home_win_prob: row.get_f64("home_win_prob")?,
            draw_prob: row.get_f64("draw_prob")?,
            away_win_prob: row.get_f64("away_win_prob")?,
            confidence: row.get_f64("confidence")?,
            created_at: row.get_text("created_at")?.to_string(),
            updated_at: row.get_text("updated_at").map(str::to_string),
        })
    }
}

/// Persists predictions keyed by match id; the latest save wins.
pub struct PredictionRecorder {
    manager: Arc<ConnectionManager>,
}

impl PredictionRecorder {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    /// Upserts the prediction, reporting success as a flag instead of an error.
    pub fn save(&self, match_id: i64, probs: OutcomeProbs, confidence: f64) -> bool {
        match self.try_save(match_id, probs, confidence) {
            Ok(()) => {
                debug!(match_id, "prediction saved");
                true
            }
            Err(err) => {
                warn!(match_id, error = %err, "prediction not saved");
                false
            }
        }
    }

    pub fn try_save(
        &self,
        match_id: i64,
        probs: OutcomeProbs,
        confidence: f64,
    ) -> Result<(), StoreError> {
        self.manager.execute_write(
            r#"
            INSERT INTO predictions (
                match_id, home_win_prob, draw_prob, away_win_prob, confidence, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)
            ON CONFLICT(match_id) DO UPDATE SET
                home_win_prob = excluded.home_win_prob,
                draw_prob = excluded.draw_prob,
                away_win_prob = excluded.away_win_prob,
                confidence = excluded.confidence,
                updated_at = excluded.created_at
            "#,
            params![
                match_id,
                probs.home,
                probs.draw,
                probs.away,
                confidence,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn load(&self, match_id: i64) -> Result<Option<StoredPrediction>, StoreError> {
        let row = self
            .manager
            .execute(
                r#"
                SELECT match_id, home_win_prob, draw_prob, away_win_prob, confidence,
                       created_at, updated_at
                FROM predictions
                WHERE match_id = ?1
                "#,
                params![match_id],
                Fetch::One,
            )?
            .into_row();
        Ok(row.as_ref().and_then(StoredPrediction::from_row))
    }
}
