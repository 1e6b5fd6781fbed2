use crate::config::TrustedProxy;
use crate::db::MetricStore;
use crate::error::MessageBody;
use crate::server::client_ip::resolve_client_ip;
use crate::server::routes;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue, StatusCode, Version, header::USER_AGENT},
    middleware::{self, Next},
    response::Response,
};
use base64::Engine as _;
use rand::RngCore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn generate_request_id() -> String {
    // 96 bits => 16 chars base64url (no padding).
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

/// Everything a handler may borrow. The store is injected, never reached through a global.
#[derive(Clone)]
pub struct RelayState {
    pub store: Arc<dyn MetricStore>,
    pub trusted_proxies: Arc<[TrustedProxy]>,
}

impl RelayState {
    pub fn new(store: Arc<dyn MetricStore>, trusted_proxies: Vec<TrustedProxy>) -> Self {
        Self {
            store,
            trusted_proxies: trusted_proxies.into(),
        }
    }
}

async fn not_found_handler() -> (StatusCode, Json<MessageBody<&'static str>>) {
    (StatusCode::NOT_FOUND, Json(MessageBody::new("Not Found")))
}

async fn method_not_allowed_handler() -> (StatusCode, Json<MessageBody<&'static str>>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(MessageBody::new("Method Not Allowed")),
    )
}

async fn access_log(State(state): State<RelayState>, req: Request, next: Next) -> Response {
    // Capture request metadata before moving `req` into the handler stack.
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map_or_else(generate_request_id, str::to_string);

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client_ip = resolve_client_ip(peer, req.headers(), &state.trusted_proxies)
        .map_or_else(|| "-".to_string(), |ip| ip.to_string());

    let start = Instant::now();
    let mut resp = next.run(req).await;

    // Always reflect `x-request-id` for easier correlation, even if the client didn't send one.
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis();
    let path = uri.path();
    let protocol = format_http_version(version);

    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {} | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            client_ip,
            user_agent
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {} | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            client_ip,
            user_agent
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {} | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            client_ip,
            user_agent
        );
    }

    resp
}

pub fn relay_router(state: RelayState) -> Router {
    routes::router()
        .fallback(not_found_handler)
        .method_not_allowed_fallback(method_not_allowed_handler)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, access_log))
}
