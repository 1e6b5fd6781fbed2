use crate::rows::SerializationError;
use thiserror::Error as ThisError;

/// Failure of a store operation after startup.
#[derive(Debug, ThisError)]
pub enum DbError {
    /// The store cannot be reached or used (includes a closed handle).
    #[error("{0}")]
    Connection(String),

    /// The result came back but could not be turned into documents.
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

impl DbError {
    pub const CLOSED: &'static str = "database handle is closed";

    pub fn closed() -> Self {
        DbError::Connection(Self::CLOSED.to_string())
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, DbError::Connection(msg) if msg == Self::CLOSED)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolClosed => DbError::closed(),
            other => DbError::Connection(other.to_string()),
        }
    }
}
