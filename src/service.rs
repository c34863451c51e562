//! Entry points used by the request layer: train, predict, record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{AppConfig, ModelConfig};
use crate::error::StoreError;
use crate::model_state::{ModelStore, ModelSummary};
use crate::predictor::{OutcomePredictor, PredictionResult};
use crate::recorder::PredictionRecorder;
use crate::store::aggregates::count_matches;
use crate::store::{ConnectionManager, PoolStats, init_schema};
use crate::strength::{FitReport, StrengthEstimator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub match_id: i64,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub competition: Option<String>,
}

/// A computed prediction plus whether persisting it succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedPrediction {
    pub match_id: i64,
    pub home_team: String,
    pub away_team: String,
    pub competition: Option<String>,
    pub prediction: PredictionResult,
    pub saved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub store_reachable: bool,
    pub matches: Option<u64>,
    pub model_trained: bool,
    pub pool: PoolStats,
}

pub struct ForecastService {
    manager: Arc<ConnectionManager>,
    model: ModelStore,
    estimator: StrengthEstimator,
    predictor: OutcomePredictor,
    recorder: PredictionRecorder,
    warm_start_min_matches: u64,
}

impl ForecastService {
    /// Opens the store described by `config` and makes sure the tables exist.
    pub fn open(config: &AppConfig) -> Result<Self, StoreError> {
        let manager = Arc::new(ConnectionManager::open(&config.store));
        init_schema(&manager)?;
        Ok(Self::new(manager, &config.model))
    }

    pub fn new(manager: Arc<ConnectionManager>, model: &ModelConfig) -> Self {
        Self {
            recorder: PredictionRecorder::new(Arc::clone(&manager)),
            manager,
            model: ModelStore::new(),
            estimator: StrengthEstimator::new(model.clone()),
            predictor: OutcomePredictor::new(model.clone()),
            warm_start_min_matches: model.warm_start_min_matches,
        }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn model(&self) -> &ModelStore {
        &self.model
    }

    pub fn recorder(&self) -> &PredictionRecorder {
        &self.recorder
    }

    pub fn fit(&self) -> FitReport {
        self.estimator.fit(&self.manager, &self.model)
    }

    /// Trains at startup when the store holds enough history. Never fails.
    pub fn warm_start(&self) -> Option<FitReport> {
        match count_matches(&self.manager) {
            Ok(n) if n > self.warm_start_min_matches => {
                info!(matches = n, "store reachable, training model");
                Some(self.fit())
            }
            Ok(n) => {
                warn!(
                    matches = n,
                    required = self.warm_start_min_matches,
                    "not enough matches to train at startup"
                );
                None
            }
            Err(err) => {
                warn!(error = %err, "store check failed at startup, model left untrained");
                None
            }
        }
    }

    /// Pure function of the current snapshot and the inputs.
    pub fn predict(
        &self,
        home_team: &str,
        away_team: &str,
        league: Option<&str>,
    ) -> PredictionResult {
        let snapshot = self.model.snapshot();
        self.predictor
            .predict(&snapshot, home_team, away_team, league)
    }

    /// Trains first if nothing has been trained yet, predicts, then records.
    pub fn predict_match(&self, request: &PredictionRequest) -> RecordedPrediction {
        if !self.model.is_trained() {
            info!(match_id = request.match_id, "model untrained, training before predicting");
            let report = self.fit();
            if !report.is_trained() {
                warn!(?report, "predicting with default strengths");
            }
        }

        let prediction = self.predict(
            &request.home_team,
            &request.away_team,
            request.competition.as_deref(),
        );
        let saved = self
            .recorder
            .save(request.match_id, prediction.probs(), prediction.confidence);

        RecordedPrediction {
            match_id: request.match_id,
            home_team: request.home_team.clone(),
            away_team: request.away_team.clone(),
            competition: request.competition.clone(),
            prediction,
            saved,
        }
    }

    pub fn summary(&self, top_n: usize) -> ModelSummary {
        self.model.snapshot().summary(top_n)
    }

    pub fn health(&self) -> HealthReport {
        let store_reachable = self.manager.ping();
        let matches = if store_reachable {
            count_matches(&self.manager).ok()
        } else {
            None
        };
        HealthReport {
            store_reachable,
            matches,
            model_trained: self.model.is_trained(),
            pool: self.manager.stats(),
        }
    }
}
