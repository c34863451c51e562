//! Data access for the match store.

pub mod aggregates;
pub mod connector;
pub mod manager;
pub mod pool;
pub mod retry;
pub mod row;
pub mod schema;

pub use connector::{Connector, SqliteConnector};
pub use manager::{ConnectionManager, Lease, PoolStats};
pub use retry::RetryPolicy;
pub use row::{Fetch, QueryOutput, Row, StatementKind};
pub use schema::{MatchRow, init_schema, upsert_match, upsert_matches};
