use serde::{Deserialize, Serialize};

/// Column list of the metric table, in bind order.
pub const METRIC_COLUMNS: [&str; 4] = ["room", "time", "metric", "action"];

/// One validated metric, persisted as one inserted row.
///
/// No uniqueness or ordering is enforced here; the table schema owns any such rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub room: String,
    pub time: String,
    pub metric: String,
    pub action: String,
}

impl MetricRecord {
    /// Values in `METRIC_COLUMNS` order.
    pub fn values(&self) -> [&str; 4] {
        [&self.room, &self.time, &self.metric, &self.action]
    }
}
