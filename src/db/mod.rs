//! Database module: the connection manager and the store seam handlers talk to.
//!
//! Layout:
//! - `manager.rs`: `Database`, the pool-backed store (connect, ping, read, insert, close)
//! - `pool.rs`: pool-shaping limits taken from configuration
//! - `ident.rs`: validated, quoted table identifiers
//! - `models.rs`: the metric row written by `/metric` and the TCP listener
//! - `mysql.rs` / `sqlite.rs`: driver rows -> `TabularResult`

mod ident;
mod manager;
mod models;
mod mysql;
mod pool;
mod sqlite;

pub use ident::{IdentError, TableRef};
pub use manager::Database;
pub use models::{METRIC_COLUMNS, MetricRecord};
pub use pool::PoolLimits;

use crate::error::DbError;
use crate::rows::TabularResult;
use async_trait::async_trait;

/// Operations handlers perform against the store.
///
/// `Database` is the production implementation; tests inject their own.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Liveness probe. The error text is reported to callers verbatim.
    async fn ping(&self) -> Result<(), DbError>;

    /// Runs the fixed read query (`SELECT *`) against the configured table.
    async fn read_all(&self) -> Result<TabularResult, DbError>;

    /// Inserts one metric row with the four values bound positionally.
    async fn insert_metric(&self, record: &MetricRecord) -> Result<(), DbError>;

    /// Releases the handle. Every later call fails with a connection error.
    async fn close(&self);
}
