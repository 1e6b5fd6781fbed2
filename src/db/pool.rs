use sqlx::{Database as SqlxDatabase, pool::PoolOptions};
use std::time::Duration;

/// sqlx's own default for `max_connections`.
const DRIVER_DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Advisory pool-shaping values. Nothing in this crate relies on them for correctness.
///
/// Mapping onto sqlx:
/// - max open -> `max_connections` (unset keeps the driver default)
/// - max idle -> `min_connections`. sqlx has no idle ceiling, so the configured count is a
///   floor of connections the pool opens in the background and keeps alive, not a cap
/// - max idle time -> `idle_timeout` for connections above that floor (unset: never reaped)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_open: Option<u32>,
    pub max_idle: u32,
    pub max_idle_time: Option<Duration>,
}

impl PoolLimits {
    /// Zero means "unset" for `max_open` and `idle_minutes`. `max_idle` is capped at the
    /// effective open limit.
    pub fn new(max_open: u32, max_idle: u32, idle_minutes: u64) -> Self {
        let max_open = (max_open > 0).then_some(max_open);
        let ceiling = max_open.unwrap_or(DRIVER_DEFAULT_MAX_CONNECTIONS);
        Self {
            max_open,
            max_idle: max_idle.min(ceiling),
            max_idle_time: (idle_minutes > 0)
                .then(|| Duration::from_secs(idle_minutes.saturating_mul(60))),
        }
    }

    pub fn apply<DB: SqlxDatabase>(&self, options: PoolOptions<DB>) -> PoolOptions<DB> {
        let options = match self.max_open {
            Some(max) => options.max_connections(max),
            None => options,
        };
        options
            .min_connections(self.max_idle)
            .idle_timeout(self.max_idle_time)
    }
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Sqlite;

    #[test]
    fn zero_values_mean_unset() {
        let limits = PoolLimits::new(0, 0, 0);
        assert_eq!(limits.max_open, None);
        assert_eq!(limits.max_idle, 0);
        assert_eq!(limits.max_idle_time, None);
    }

    #[test]
    fn idle_is_capped_by_open() {
        assert_eq!(PoolLimits::new(4, 9, 0).max_idle, 4);
        assert_eq!(PoolLimits::new(0, 50, 0).max_idle, DRIVER_DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn minutes_become_duration() {
        assert_eq!(
            PoolLimits::new(5, 2, 3).max_idle_time,
            Some(Duration::from_secs(180))
        );
    }

    #[test]
    fn zero_idle_keeps_no_warm_connections() {
        let options = PoolLimits::new(5, 0, 0).apply(PoolOptions::<Sqlite>::new());
        assert_eq!(options.get_min_connections(), 0);
        assert_eq!(options.get_idle_timeout(), None);
    }

    #[test]
    fn apply_sets_pool_options() {
        let options = PoolLimits::new(7, 3, 1).apply(PoolOptions::<Sqlite>::new());
        assert_eq!(options.get_max_connections(), 7);
        assert_eq!(options.get_min_connections(), 3);
        assert_eq!(options.get_idle_timeout(), Some(Duration::from_secs(60)));
    }
}
