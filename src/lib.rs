//! Team strength estimation and match outcome forecasting over a historical match store.

pub mod config;
pub mod error;
pub mod fake_history;
pub mod logging;
pub mod model_state;
pub mod predictor;
pub mod recorder;
pub mod service;
pub mod store;
pub mod strength;

pub use config::{AppConfig, ModelConfig, StoreConfig};
pub use error::{ConfigError, ErrorClass, StoreError};
pub use model_state::{ModelSnapshot, ModelStore, ModelSummary};
pub use predictor::{Outcome, OutcomePredictor, PredictionResult, Scoreline};
pub use recorder::{PredictionRecorder, StoredPrediction};
pub use service::{ForecastService, PredictionRequest, RecordedPrediction};
pub use strength::{FitReport, LeagueEffect, StrengthEstimator, TeamStrength};
