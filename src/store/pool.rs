//! Fixed-capacity pool of store connections, opened eagerly.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use rusqlite::Connection;

use super::connector::Connector;
use crate::error::StoreError;

pub struct ConnectionPool {
    idle: Mutex<Vec<Connection>>,
    returned: Condvar,
    capacity: usize,
}

impl ConnectionPool {
    /// Opens `capacity` connections up front. Any failure discards the whole pool.
    pub fn open(connector: &dyn Connector, capacity: usize) -> rusqlite::Result<Self> {
        let mut idle = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            idle.push(connector.connect()?);
        }
        Ok(Self {
            idle: Mutex::new(idle),
            returned: Condvar::new(),
            capacity,
        })
    }

    /// Takes an idle connection, waiting up to `wait` for one to be returned.
    pub fn checkout(&self, wait: Duration) -> Result<Connection, StoreError> {
        let guard = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut guard, timeout) = self
            .returned
            .wait_timeout_while(guard, wait, |idle| idle.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        match guard.pop() {
            Some(conn) => Ok(conn),
            None if timeout.timed_out() => Err(StoreError::TooManyConnections(format!(
                "pool exhausted ({} connections busy for {:?})",
                self.capacity, wait
            ))),
            None => Err(StoreError::TooManyConnections(
                "pool exhausted".to_string(),
            )),
        }
    }

    pub fn checkin(&self, conn: Connection) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        idle.push(conn);
        drop(idle);
        self.returned.notify_one();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
