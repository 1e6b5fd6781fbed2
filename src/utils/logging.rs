use serde::Serialize;
use tracing::debug;

/// Logs `value` as compact JSON at DEBUG. Serialization is skipped when DEBUG is off.
pub(crate) fn debug_json<T>(what: &str, value: &T)
where
    T: Serialize,
{
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    match serde_json::to_string(value) {
        Ok(json) => debug!(payload = %json, "{what}"),
        Err(error) => debug!(%error, "{what} (payload not serializable)"),
    }
}
