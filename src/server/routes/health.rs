use crate::error::{MessageBody, RelayError};
use crate::server::router::RelayState;
use axum::{Json, extract::State};
use std::time::Duration;
use tracing::warn;

/// Upper bound on the kill-switch probe. The other routes wait on the store indefinitely.
pub const GATE_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub(super) async fn home_handler() -> Json<&'static str> {
    Json("You have reached the dev proxy server")
}

pub(super) async fn status_handler(
    State(state): State<RelayState>,
) -> Result<Json<MessageBody<&'static str>>, RelayError> {
    state.store.ping().await.map_err(RelayError::Unavailable)?;
    Ok(Json(MessageBody::new("Okay")))
}

/// Operator/debug route. There is no way back short of restarting the process.
pub(super) async fn disconnect_handler(
    State(state): State<RelayState>,
) -> Json<MessageBody<&'static str>> {
    state.store.close().await;
    warn!("Database handle closed by request; restart the process to reconnect");
    Json(MessageBody::new("Disconnected from database"))
}

/// `"True"` when the store answers a ping within `GATE_PROBE_TIMEOUT`, `"False"` otherwise.
pub(super) async fn metrics_enabled_handler(State(state): State<RelayState>) -> Json<&'static str> {
    let enabled = match tokio::time::timeout(GATE_PROBE_TIMEOUT, state.store.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "Metrics gate closed: database ping failed");
            false
        }
        Err(_) => {
            warn!(
                timeout_secs = GATE_PROBE_TIMEOUT.as_secs(),
                "Metrics gate closed: database ping timed out"
            );
            false
        }
    };
    Json(if enabled { "True" } else { "False" })
}
