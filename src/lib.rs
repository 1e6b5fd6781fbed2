pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod rows;
pub mod server;
mod utils;

pub use db::{Database, MetricRecord, MetricStore};
pub use error::{DbError, RelayError, StartupError, ValidationError};
