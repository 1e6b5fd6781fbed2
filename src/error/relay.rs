use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error as ThisError;

use super::DbError;
use crate::rows::SerializationError;

/// Request body failed the typed decode + presence/type checks.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ValidationError {
    #[error("Invalid JSON data")]
    InvalidJson { detail: String },

    #[error("Missing or invalid fields in JSON data: {}", .fields.join(", "))]
    Fields { fields: Vec<&'static str> },
}

/// Errors surfaced to HTTP callers. Each maps to a status and a `{"message": ...}` body.
#[derive(Debug, ThisError)]
pub enum RelayError {
    #[error("Error connecting to database: {0}")]
    Unavailable(DbError),

    #[error("Error reading from database: {0}")]
    Read(DbError),

    #[error("Error serializing to json: {0}")]
    Serialize(#[from] SerializationError),

    /// Driver detail is logged, not returned.
    #[error("Failed to insert data into database")]
    Insert(DbError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl RelayError {
    /// Splits a read failure into its connection and serialization halves.
    pub fn from_read(err: DbError) -> Self {
        match err {
            DbError::Serialization(e) => RelayError::Serialize(e),
            other => RelayError::Read(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Unavailable(_)
            | RelayError::Read(_)
            | RelayError::Serialize(_)
            | RelayError::Insert(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            RelayError::Insert(source) => {
                tracing::error!(error = %source, "Metric insert failed");
            }
            RelayError::Validation(ValidationError::InvalidJson { detail }) => {
                tracing::warn!(debug_message = %detail, "Metric request rejected");
            }
            RelayError::Validation(e) => {
                tracing::warn!(message = %e, "Metric request rejected");
            }
            other => {
                tracing::error!(message = %other, "Database request failed");
            }
        }
        (status, Json(MessageBody::new(self.to_string()))).into_response()
    }
}

/// Extractor rejections render like every other relay error.
impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        RelayError::Validation(self).into_response()
    }
}

/// `{"message": ...}` payload shared by success and error responses.
#[derive(Debug, Serialize)]
pub struct MessageBody<T> {
    pub message: T,
}

impl<T> MessageBody<T> {
    pub fn new(message: T) -> Self {
        Self { message }
    }
}
