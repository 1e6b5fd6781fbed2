use super::extract::MetricPayload;
use crate::error::{MessageBody, RelayError};
use crate::rows::{self, Document};
use crate::server::router::RelayState;
use axum::{Json, extract::State};
use tracing::debug;

/// Runs the fixed read query and returns every row as a document.
pub(super) async fn read_handler(
    State(state): State<RelayState>,
) -> Result<Json<MessageBody<Vec<Document>>>, RelayError> {
    let result = state
        .store
        .read_all()
        .await
        .map_err(RelayError::from_read)?;
    let docs = rows::serialize(&result)?;

    debug!(rows = docs.len(), "Read query served");
    Ok(Json(MessageBody::new(docs)))
}

pub(super) async fn metric_handler(
    State(state): State<RelayState>,
    MetricPayload(record): MetricPayload,
) -> Result<Json<MessageBody<&'static str>>, RelayError> {
    state
        .store
        .insert_metric(&record)
        .await
        .map_err(RelayError::Insert)?;

    debug!(room = %record.room, metric = %record.metric, action = %record.action, "Metric stored");
    Ok(Json(MessageBody::new("Success")))
}
