#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, ffi};

use match_forecast::StoreConfig;
use match_forecast::config::ModelConfig;
use match_forecast::service::ForecastService;
use match_forecast::store::{
    ConnectionManager, Connector, MatchRow, SqliteConnector, init_schema, upsert_matches,
};

pub fn fast_store_config(path: &Path) -> StoreConfig {
    StoreConfig {
        db_path: path.to_path_buf(),
        pool_size: 3,
        max_retries: 3,
        retry_delay: Duration::from_millis(5),
        too_many_cooldown: Duration::from_millis(5),
        min_acquire_interval: Duration::ZERO,
        pool_wait: Duration::from_millis(200),
        busy_timeout: Duration::from_secs(5),
        execute_timeout: None,
    }
}

/// Wraps a real SQLite connector and fails the first connects with scripted codes.
pub struct FlakyConnector {
    inner: SqliteConnector,
    script: Mutex<VecDeque<i32>>,
    pub connects: Arc<AtomicUsize>,
}

impl FlakyConnector {
    pub fn new(path: &Path, failures: &[i32]) -> Self {
        Self {
            inner: SqliteConnector::new(path, Duration::from_secs(5)),
            script: Mutex::new(failures.iter().copied().collect()),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Connector for FlakyConnector {
    fn connect(&self) -> rusqlite::Result<Connection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = self.script.lock().unwrap().pop_front() {
            return Err(rusqlite::Error::SqliteFailure(
                ffi::Error::new(code),
                Some(format!("scripted failure {code}")),
            ));
        }
        self.inner.connect()
    }

    fn describe(&self) -> String {
        format!("flaky {}", self.inner.describe())
    }
}

pub fn open_service(path: &Path) -> ForecastService {
    let manager = Arc::new(ConnectionManager::open(&fast_store_config(path)));
    init_schema(&manager).expect("schema");
    ForecastService::new(manager, &ModelConfig::default())
}

pub fn seed(service: &ForecastService, rows: &[MatchRow]) {
    upsert_matches(service.manager(), rows).expect("seed matches");
}

/// Ligue 1: five clubs, double round robin, every match 2-1 (20 matches, 3 goals each).
/// Friendlies: Rennes at home 30 times, 15 wins 2-1 and 15 draws 1-1.
pub fn scenario_rows() -> Vec<MatchRow> {
    let clubs = ["Lens", "Lille", "Lyon", "Nice", "Brest"];
    let mut rows = Vec::new();
    let mut day = 1;
    for home in clubs {
        for away in clubs {
            if home == away {
                continue;
            }
            rows.push(MatchRow::scored(
                "Ligue 1",
                &format!("2024-09-{:02}", day % 28 + 1),
                home,
                away,
                2,
                1,
            ));
            day += 1;
        }
    }
    for i in 0..30 {
        let (h, a) = if i < 15 { (2, 1) } else { (1, 1) };
        rows.push(MatchRow::scored(
            "Friendlies",
            "2024-07-01",
            "Rennes",
            &format!("Guest {i}"),
            h,
            a,
        ));
    }
    rows
}
