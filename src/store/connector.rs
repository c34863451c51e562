use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

/// Opens raw connections to the match store.
pub trait Connector: Send + Sync {
    fn connect(&self) -> rusqlite::Result<Connection>;

    /// Human readable target, used in logs only.
    fn describe(&self) -> String;
}

pub struct SqliteConnector {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Connector for SqliteConnector {
    fn connect(&self) -> rusqlite::Result<Connection> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}
