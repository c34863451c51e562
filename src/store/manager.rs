//! Connection manager for a store with a hard cap on simultaneous connections.
//!
//! Every acquisition goes through a rate floor and a bounded retry loop; every
//! connection handed out is wrapped in a [`Lease`] so it is returned (pooled) or
//! closed (unpooled) on every exit path.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use rusqlite::types::Value;
use rusqlite::{Connection, ToSql};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::connector::{Connector, SqliteConnector};
use super::pool::ConnectionPool;
use super::retry::RetryPolicy;
use super::row::{Fetch, QueryOutput, Row, StatementKind};
use crate::config::StoreConfig;
use crate::error::{ErrorClass, StoreError};

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
    pooled: AtomicU64,
    unpooled: AtomicU64,
    retries: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub acquired: u64,
    pub released: u64,
    pub pooled: u64,
    pub unpooled: u64,
    pub retries: u64,
}

pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    pool: Option<ConnectionPool>,
    policy: RetryPolicy,
    min_interval: Duration,
    pool_wait: Duration,
    busy_timeout: Duration,
    execute_timeout: Option<Duration>,
    last_acquire: Mutex<Option<Instant>>,
    counters: Counters,
}

enum Origin<'a> {
    Pooled(&'a ConnectionPool),
    Direct,
}

/// A connection on loan from the manager.
pub struct Lease<'a> {
    conn: Option<Connection>,
    origin: Origin<'a>,
    counters: &'a Counters,
}

impl Deref for Lease<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("lease holds a connection until dropped")
    }
}

impl DerefMut for Lease<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("lease holds a connection until dropped")
    }
}

impl Lease<'_> {
    pub fn is_pooled(&self) -> bool {
        matches!(self.origin, Origin::Pooled(_))
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            match self.origin {
                Origin::Pooled(pool) => pool.checkin(conn),
                Origin::Direct => {
                    if let Err((_, err)) = conn.close() {
                        warn!(error = %err, "closing unpooled connection failed");
                    }
                }
            }
        }
        self.counters.released.fetch_add(1, Ordering::Relaxed);
    }
}

impl ConnectionManager {
    pub fn open(cfg: &StoreConfig) -> Self {
        Self::with_connector(SqliteConnector::new(&cfg.db_path, cfg.busy_timeout), cfg)
    }

    /// Builds the manager, creating the pool eagerly. A pool that cannot be
    /// created is logged and the manager falls back to one connection per call.
    pub fn with_connector(connector: impl Connector + 'static, cfg: &StoreConfig) -> Self {
        let pool = if cfg.pool_size == 0 {
            None
        } else {
            match ConnectionPool::open(&connector, cfg.pool_size) {
                Ok(pool) => {
                    info!(
                        target_store = %connector.describe(),
                        size = cfg.pool_size,
                        "connection pool ready"
                    );
                    Some(pool)
                }
                Err(err) => {
                    warn!(
                        target_store = %connector.describe(),
                        error = %err,
                        "connection pool unavailable, using direct connections"
                    );
                    None
                }
            }
        };

        Self {
            connector: Box::new(connector),
            pool,
            policy: RetryPolicy::from_config(cfg),
            min_interval: cfg.min_acquire_interval,
            pool_wait: cfg.pool_wait,
            busy_timeout: cfg.busy_timeout,
            execute_timeout: cfg.execute_timeout,
            last_acquire: Mutex::new(None),
            counters: Counters::default(),
        }
    }

    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            acquired: self.counters.acquired.load(Ordering::Relaxed),
            released: self.counters.released.load(Ordering::Relaxed),
            pooled: self.counters.pooled.load(Ordering::Relaxed),
            unpooled: self.counters.unpooled.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
        }
    }

    pub fn acquire(&self) -> Result<Lease<'_>, StoreError> {
        self.acquire_within(None)
    }

    /// Acquires a connection, giving up with [`StoreError::Timeout`] once `budget`
    /// (measured from now) cannot cover the next backoff.
    pub fn acquire_within(&self, budget: Option<Duration>) -> Result<Lease<'_>, StoreError> {
        let deadline = budget.map(|b| Instant::now() + b);
        let mut retry = 0u32;
        loop {
            self.throttle(deadline, budget)?;
            let err = match self.try_acquire(deadline) {
                Ok(lease) => return Ok(lease),
                Err(err) => err,
            };

            let class = err.class();
            retry += 1;
            let Some(delay) = self.policy.backoff(class, retry) else {
                return Err(self.exhausted(err, class, retry));
            };
            if let Some(deadline) = deadline
                && Instant::now() + delay >= deadline
            {
                warn!(error = %err, "store call budget spent while retrying");
                return Err(StoreError::Timeout(budget.unwrap_or_default()));
            }

            warn!(
                error = %err,
                class = ?class,
                retry,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                "store connection failed, backing off"
            );
            self.counters.retries.fetch_add(1, Ordering::Relaxed);
            thread::sleep(delay);
        }
    }

    fn exhausted(&self, err: StoreError, class: ErrorClass, attempts: u32) -> StoreError {
        match class {
            ErrorClass::AccessDenied => {
                warn!(error = %err, "store rejected credentials");
                err
            }
            ErrorClass::TooManyConnections | ErrorClass::Unreachable => {
                warn!(error = %err, attempts, "store unavailable, giving up");
                StoreError::Unavailable {
                    attempts,
                    last: err.to_string(),
                }
            }
            ErrorClass::Transient => err,
        }
    }

    /// Keeps acquisitions at least `min_interval` apart across all callers.
    /// A wait that would overrun `deadline` fails before sleeping.
    fn throttle(
        &self,
        deadline: Option<Instant>,
        budget: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut last = self
            .last_acquire
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = *last {
            let wait = self.min_interval.saturating_sub(prev.elapsed());
            if !wait.is_zero() {
                if let Some(deadline) = deadline
                    && Instant::now() + wait >= deadline
                {
                    debug!(wait_ms = wait.as_millis() as u64, "rate floor exceeds call budget");
                    return Err(StoreError::Timeout(budget.unwrap_or_default()));
                }
                thread::sleep(wait);
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }

    fn try_acquire(&self, deadline: Option<Instant>) -> Result<Lease<'_>, StoreError> {
        let (conn, origin) = match &self.pool {
            Some(pool) => {
                let wait = match deadline {
                    Some(deadline) => self
                        .pool_wait
                        .min(deadline.saturating_duration_since(Instant::now())),
                    None => self.pool_wait,
                };
                (pool.checkout(wait)?, Origin::Pooled(pool))
            }
            None => (
                self.connector.connect().map_err(StoreError::from_connect)?,
                Origin::Direct,
            ),
        };

        let n = self.counters.acquired.fetch_add(1, Ordering::Relaxed) + 1;
        match origin {
            Origin::Pooled(_) => self.counters.pooled.fetch_add(1, Ordering::Relaxed),
            Origin::Direct => self.counters.unpooled.fetch_add(1, Ordering::Relaxed),
        };
        if n % 100 == 0 {
            debug!(acquired = n, "store connections handed out");
        }

        Ok(Lease {
            conn: Some(conn),
            origin,
            counters: &self.counters,
        })
    }

    /// Runs one statement on a leased connection, bounded by the configured timeout.
    pub fn execute(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        fetch: Fetch,
    ) -> Result<QueryOutput, StoreError> {
        self.execute_with_timeout(sql, params, fetch, self.execute_timeout)
    }

    /// Runs an INSERT/UPDATE/DELETE, yielding the new row id for fresh inserts
    /// and the changed row count otherwise.
    pub fn execute_write(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<QueryOutput, StoreError> {
        self.execute_with_timeout(sql, params, Fetch::All, self.execute_timeout)
    }

    /// Like [`execute`](Self::execute) with a caller-supplied budget covering
    /// acquisition, retries and the statement itself.
    pub fn execute_with_timeout(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        fetch: Fetch,
        timeout: Option<Duration>,
    ) -> Result<QueryOutput, StoreError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut lease = self.acquire_within(timeout)?;

        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(StoreError::Timeout(timeout.unwrap_or_default()));
            }
            lease.busy_timeout(remaining)?;
        }

        let result = run_statement(&mut lease, sql, params, fetch);
        if deadline.is_some()
            && let Err(err) = lease.busy_timeout(self.busy_timeout)
        {
            warn!(error = %err, "restoring busy timeout failed");
        }
        if let Err(err) = &result {
            warn!(error = %err, "store statement failed");
        }
        result
    }

    /// `SELECT 1` round trip.
    pub fn ping(&self) -> bool {
        match self.execute("SELECT 1 AS ok", &[], Fetch::One) {
            Ok(out) => out.into_row().and_then(|row| row.get_i64("ok")) == Some(1),
            Err(err) => {
                warn!(error = %err, "store ping failed");
                false
            }
        }
    }
}

fn run_statement(
    conn: &mut Connection,
    sql: &str,
    params: &[&dyn ToSql],
    fetch: Fetch,
) -> Result<QueryOutput, StoreError> {
    match StatementKind::of(sql) {
        StatementKind::Read => read_rows(conn, sql, params, fetch),
        kind => write(conn, sql, params, kind),
    }
}

fn read_rows(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
    fetch: Fetch,
) -> Result<QueryOutput, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let names = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut pairs = Vec::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            pairs.push((name.clone(), row.get::<_, Value>(idx)?));
        }
        out.push(Row::from_pairs(pairs));
        if fetch == Fetch::One {
            break;
        }
    }

    Ok(match fetch {
        Fetch::All => QueryOutput::Rows(out),
        Fetch::One => QueryOutput::Row(out.into_iter().next()),
    })
}

fn write(
    conn: &mut Connection,
    sql: &str,
    params: &[&dyn ToSql],
    kind: StatementKind,
) -> Result<QueryOutput, StoreError> {
    let tx = conn.transaction()?;
    let id_before = tx.last_insert_rowid();
    let changed = match tx.execute(sql, params) {
        Ok(n) => n,
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!(error = %rollback_err, "rollback failed");
            }
            return Err(StoreError::Query(err));
        }
    };
    // The rowid only moves when a row was actually inserted; an upsert that
    // took its DO UPDATE branch leaves it alone.
    let id_after = tx.last_insert_rowid();
    // A failed commit drops the transaction, which rolls it back.
    tx.commit().map_err(StoreError::Commit)?;

    Ok(match kind {
        StatementKind::Insert if changed > 0 && id_after != id_before => {
            QueryOutput::Inserted(id_after)
        }
        _ => QueryOutput::Affected(changed),
    })
}
