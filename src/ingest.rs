//! TCP metric listener for processors that cannot speak HTTP.
//!
//! Each connection carries one JSON object `{"room": .., "metric": .., "action": ..}`, terminated
//! by EOF or a newline. The processor has no clock to offer, so `time` is stamped here on
//! receipt. Nothing is written back.

use crate::db::{MetricRecord, MetricStore};
use crate::error::{DbError, ValidationError};
use crate::server::routes::extract::{json_object, require_string};
use crate::utils::logging::debug_json;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Largest accepted message, in bytes.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Local time, second precision, no offset.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, ThisError)]
pub enum IngestError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("message exceeds 4096 bytes")]
    TooLarge,

    #[error("empty message")]
    Empty,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("insert failed: {0}")]
    Store(#[from] DbError),
}

#[derive(Debug, Default, Serialize)]
struct IngestBody {
    room: Option<Value>,
    metric: Option<Value>,
    action: Option<Value>,
}

impl IngestBody {
    fn from_slice(raw: &[u8]) -> Result<Self, ValidationError> {
        let mut fields = json_object(raw)?;
        Ok(Self {
            room: fields.remove("room"),
            metric: fields.remove("metric"),
            action: fields.remove("action"),
        })
    }

    fn into_record(self, time: String) -> Result<MetricRecord, ValidationError> {
        let mut invalid = Vec::new();
        let room = require_string("room", self.room, &mut invalid);
        let metric = require_string("metric", self.metric, &mut invalid);
        let action = require_string("action", self.action, &mut invalid);

        match (room, metric, action) {
            (Some(room), Some(metric), Some(action)) => Ok(MetricRecord {
                room,
                time,
                metric,
                action,
            }),
            _ => Err(ValidationError::Fields { fields: invalid }),
        }
    }
}

/// Accepts connections until the task is dropped. Per-connection failures are logged and never
/// stop the listener.
pub async fn serve(listener: TcpListener, store: Arc<dyn MetricStore>) {
    match listener.local_addr() {
        Ok(addr) => info!(%addr, "TCP metric listener ready"),
        Err(e) => warn!(error = %e, "TCP metric listener ready (address unknown)"),
    }

    loop {
        let (mut stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "TCP metric listener: accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let store = store.clone();
        tokio::spawn(async move {
            match ingest_one(&mut stream, store.as_ref()).await {
                Ok(record) => info!(
                    %peer,
                    room = %record.room,
                    metric = %record.metric,
                    action = %record.action,
                    "TCP metric stored"
                ),
                Err(e) => warn!(%peer, error = %e, "TCP metric dropped"),
            }
        });
    }
}

/// Reads one message from `reader`, stamps it and inserts it.
pub async fn ingest_one<R>(reader: &mut R, store: &dyn MetricStore) -> Result<MetricRecord, IngestError>
where
    R: AsyncRead + Unpin,
{
    let raw = read_message(reader).await?;
    let time = chrono::Local::now().format(TIME_FORMAT).to_string();

    let body = IngestBody::from_slice(&raw)?;
    debug_json("Received TCP metric", &body);
    let record = body.into_record(time)?;

    store.insert_metric(&record).await?;
    Ok(record)
}

/// Bytes up to EOF or the first newline, trimmed.
async fn read_message<R>(reader: &mut R) -> Result<Vec<u8>, IngestError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(256);
    let mut chunk = [0u8; 512];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let read = &chunk[..n];
        if let Some(pos) = read.iter().position(|b| *b == b'\n') {
            buf.extend_from_slice(&read[..pos]);
            break;
        }
        buf.extend_from_slice(read);
        if buf.len() > MAX_MESSAGE_LEN {
            return Err(IngestError::TooLarge);
        }
    }
    if buf.len() > MAX_MESSAGE_LEN {
        return Err(IngestError::TooLarge);
    }

    let trimmed = buf.trim_ascii();
    if trimmed.is_empty() {
        return Err(IngestError::Empty);
    }
    Ok(trimmed.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn message_stops_at_newline() {
        let mut input: &[u8] = b"  {\"a\":1}\nleftover";
        assert_eq!(read_message(&mut input).await.unwrap(), b"{\"a\":1}");
    }

    #[tokio::test]
    async fn message_stops_at_eof() {
        let mut input: &[u8] = b"{\"a\":1}";
        assert_eq!(read_message(&mut input).await.unwrap(), b"{\"a\":1}");
    }

    #[tokio::test]
    async fn oversized_message_is_rejected() {
        let big = vec![b'x'; MAX_MESSAGE_LEN + 1];
        let mut input: &[u8] = &big;
        assert!(matches!(
            read_message(&mut input).await,
            Err(IngestError::TooLarge)
        ));
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let mut input: &[u8] = b" \r\n";
        assert!(matches!(read_message(&mut input).await, Err(IngestError::Empty)));
    }

    #[test]
    fn array_message_is_rejected() {
        assert!(matches!(
            IngestBody::from_slice(br#"["GLNN210","Camera","Started"]"#),
            Err(ValidationError::InvalidJson { .. })
        ));
    }

    #[test]
    fn record_requires_three_fields() {
        let body = IngestBody {
            room: Some(Value::from("GLNN210")),
            metric: Some(Value::from(7)),
            action: None,
        };
        assert_eq!(
            body.into_record("t".into()).unwrap_err(),
            ValidationError::Fields {
                fields: vec!["metric", "action"]
            }
        );
    }
}
