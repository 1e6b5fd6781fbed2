use crate::server::router::RelayState;
use axum::{
    Router,
    routing::{get, post},
};

pub mod extract;
pub mod health;
pub mod records;

pub fn router() -> Router<RelayState> {
    Router::new()
        .route("/", get(health::home_handler))
        .route("/status", get(health::status_handler))
        .route("/disconnect", get(health::disconnect_handler))
        // Kill-switch polled by control processors before they start sending metrics.
        .route("/data/global/enable", get(health::metrics_enabled_handler))
        .route("/test", get(records::read_handler))
        .route("/metric", post(records::metric_handler))
}
