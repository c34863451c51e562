use std::time::Duration;

use rusqlite::ErrorCode;
use thiserror::Error;

/// How a failed acquisition should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    TooManyConnections,
    AccessDenied,
    Unreachable,
    Transient,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("too many connections: {0}")]
    TooManyConnections(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("connection failed: {0}")]
    Connect(#[source] rusqlite::Error),

    #[error("store unavailable after {attempts} attempts: {last}")]
    Unavailable { attempts: u32, last: String },

    #[error("store call exceeded its {0:?} budget")]
    Timeout(Duration),

    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("commit failed: {0}")]
    Commit(#[source] rusqlite::Error),
}

impl StoreError {
    /// Maps a driver error raised while opening a connection onto the retry taxonomy.
    pub fn from_connect(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                StoreError::TooManyConnections(err.to_string())
            }
            Some(
                ErrorCode::PermissionDenied
                | ErrorCode::AuthorizationForStatementDenied
                | ErrorCode::ReadOnly,
            ) => StoreError::AccessDenied(err.to_string()),
            Some(ErrorCode::CannotOpen) => StoreError::Unreachable(err.to_string()),
            _ => StoreError::Connect(err),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            StoreError::TooManyConnections(_) => ErrorClass::TooManyConnections,
            StoreError::AccessDenied(_) => ErrorClass::AccessDenied,
            StoreError::Unreachable(_) | StoreError::Unavailable { .. } => ErrorClass::Unreachable,
            StoreError::Connect(_)
            | StoreError::Timeout(_)
            | StoreError::Query(_)
            | StoreError::Commit(_) => ErrorClass::Transient,
        }
    }

    /// True when the caller should answer with a service-unavailable status.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. } | StoreError::Timeout(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{key} must be {expected}")]
    OutOfRange {
        key: &'static str,
        expected: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), None)
    }

    #[test]
    fn connect_errors_map_to_classes() {
        assert_eq!(
            StoreError::from_connect(sqlite_failure(ffi::SQLITE_BUSY)).class(),
            ErrorClass::TooManyConnections
        );
        assert_eq!(
            StoreError::from_connect(sqlite_failure(ffi::SQLITE_PERM)).class(),
            ErrorClass::AccessDenied
        );
        assert_eq!(
            StoreError::from_connect(sqlite_failure(ffi::SQLITE_CANTOPEN)).class(),
            ErrorClass::Unreachable
        );
        assert_eq!(
            StoreError::from_connect(sqlite_failure(ffi::SQLITE_IOERR)).class(),
            ErrorClass::Transient
        );
    }

    #[test]
    fn only_exhausted_and_timeout_are_unavailable() {
        let err = StoreError::Unavailable {
            attempts: 4,
            last: "down".to_string(),
        };
        assert!(err.is_unavailable());
        assert!(StoreError::Timeout(Duration::from_secs(1)).is_unavailable());
        assert!(!StoreError::AccessDenied("nope".to_string()).is_unavailable());
    }
}
