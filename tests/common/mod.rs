#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use metric_relay::db::{MetricRecord, MetricStore};
use metric_relay::error::DbError;
use metric_relay::rows::TabularResult;
use metric_relay::server::{RelayState, relay_router};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

/// In-memory store that records inserts and can be told to fail.
#[derive(Default)]
pub struct MockStore {
    pub rows: Mutex<TabularResult>,
    pub inserts: Mutex<Vec<MetricRecord>>,
    pub ping_error: Option<String>,
    pub read_error: Option<String>,
    pub insert_error: Option<String>,
    closed: AtomicBool,
}

impl MockStore {
    pub fn with_rows(rows: TabularResult) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn unreachable(message: &str) -> Self {
        Self {
            ping_error: Some(message.to_string()),
            read_error: Some(message.to_string()),
            insert_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn inserted(&self) -> Vec<MetricRecord> {
        self.inserts.lock().unwrap().clone()
    }

    fn check_open(&self) -> Result<(), DbError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(DbError::closed())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MetricStore for MockStore {
    async fn ping(&self) -> Result<(), DbError> {
        self.check_open()?;
        match &self.ping_error {
            Some(msg) => Err(DbError::Connection(msg.clone())),
            None => Ok(()),
        }
    }

    async fn read_all(&self) -> Result<TabularResult, DbError> {
        self.check_open()?;
        match &self.read_error {
            Some(msg) => Err(DbError::Connection(msg.clone())),
            None => Ok(self.rows.lock().unwrap().clone()),
        }
    }

    async fn insert_metric(&self, record: &MetricRecord) -> Result<(), DbError> {
        self.check_open()?;
        if let Some(msg) = &self.insert_error {
            return Err(DbError::Connection(msg.clone()));
        }
        self.inserts.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn app_with(store: Arc<dyn MetricStore>) -> Router {
    relay_router(RelayState::new(store, Vec::new()))
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let resp = app
        .clone()
        .oneshot(request)
        .await
        .expect("request failed");
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let body = String::from_utf8(body.to_vec()).expect("response body was not utf-8");
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request")
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

/// Unique path under the system temp dir.
pub fn temp_path(prefix: &str, ext: &str) -> std::path::PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "metric-relay-{prefix}-{}-{nanos}.{ext}",
        std::process::id()
    ))
}
