use super::ident::{quote_mysql, quote_sqlite};
use super::models::{METRIC_COLUMNS, MetricRecord};
use super::{MetricStore, TableRef, mysql, sqlite};
use crate::config::{Config, DbDriver};
use crate::error::{DbError, StartupError};
use crate::rows::TabularResult;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{ConnectOptions, Connection, Database as SqlxDatabase, Pool};
use std::net::SocketAddr;
use tracing::{debug, info};

const MYSQL_DEFAULT_PORT: u16 = 3306;

#[derive(Debug, Clone)]
enum DbPool {
    Mysql(MySqlPool),
    Sqlite(SqlitePool),
}

/// The process-wide store handle. Owned by `main`, shared with handlers through `RelayState`.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
    table: TableRef,
    insert_sql: String,
    select_sql: String,
}

impl Database {
    /// Builds the pool with the configured limits and probes the store once. Any failure is
    /// fatal; there is no startup retry.
    pub async fn connect(cfg: &Config) -> Result<Self, StartupError> {
        let table = cfg.table_ref()?;
        let limits = cfg.pool_limits();

        let pool = match cfg.db_driver {
            DbDriver::Mysql => {
                let options = mysql_connect_options(cfg);
                DbPool::Mysql(limits.apply(MySqlPoolOptions::new()).connect_lazy_with(options))
            }
            DbDriver::Sqlite => {
                let options = SqliteConnectOptions::new().filename(&cfg.db_address);
                DbPool::Sqlite(limits.apply(SqlitePoolOptions::new()).connect_lazy_with(options))
            }
        };

        let db = Self::from_parts(pool, table);
        db.probe().await.map_err(StartupError::Connect)?;

        info!(
            driver = ?cfg.db_driver,
            address = %cfg.db_address,
            table = %db.table,
            max_open = ?limits.max_open,
            max_idle = limits.max_idle,
            max_idle_time = ?limits.max_idle_time,
            "Database connection established"
        );
        Ok(db)
    }

    /// Wraps an already opened SQLite pool. Limits are the caller's business.
    pub fn from_sqlite_pool(pool: SqlitePool, table: TableRef) -> Self {
        Self::from_parts(DbPool::Sqlite(pool), table)
    }

    /// Wraps an already opened MySQL pool.
    pub fn from_mysql_pool(pool: MySqlPool, table: TableRef) -> Self {
        Self::from_parts(DbPool::Mysql(pool), table)
    }

    fn from_parts(pool: DbPool, table: TableRef) -> Self {
        let (target, columns) = match pool {
            DbPool::Mysql(_) => (
                table.quoted_mysql(),
                METRIC_COLUMNS.map(quote_mysql).join(", "),
            ),
            DbPool::Sqlite(_) => (
                table.quoted_sqlite(),
                METRIC_COLUMNS.map(quote_sqlite).join(", "),
            ),
        };
        Self {
            select_sql: format!("SELECT * FROM {target}"),
            insert_sql: format!("INSERT INTO {target} ({columns}) VALUES (?, ?, ?, ?)"),
            pool,
            table,
        }
    }

    pub fn is_closed(&self) -> bool {
        match &self.pool {
            DbPool::Mysql(pool) => pool.is_closed(),
            DbPool::Sqlite(pool) => pool.is_closed(),
        }
    }

    async fn probe(&self) -> Result<(), sqlx::Error> {
        match &self.pool {
            DbPool::Mysql(pool) => ping_pool(pool).await,
            DbPool::Sqlite(pool) => ping_pool(pool).await,
        }
    }
}

/// Pings on a dedicated connection built from the pool's options. A refused or failed connect
/// comes back as the driver's own error rather than `PoolTimedOut` after the acquire timeout.
async fn ping_pool<DB: SqlxDatabase>(pool: &Pool<DB>) -> Result<(), sqlx::Error> {
    if pool.is_closed() {
        return Err(sqlx::Error::PoolClosed);
    }
    let mut conn = pool.connect_options().connect().await?;
    conn.ping().await?;
    conn.close().await
}

/// `DBAddress` is `host`, `host:port` or `[v6]:port`.
fn split_host_port(address: &str) -> (String, u16) {
    if let Ok(sock) = address.parse::<SocketAddr>() {
        return (sock.ip().to_string(), sock.port());
    }
    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (address.to_string(), MYSQL_DEFAULT_PORT),
        },
        _ => (address.to_string(), MYSQL_DEFAULT_PORT),
    }
}

fn mysql_connect_options(cfg: &Config) -> MySqlConnectOptions {
    let (host, port) = split_host_port(&cfg.db_address);
    let options = MySqlConnectOptions::new()
        .host(&host)
        .port(port)
        .username(&cfg.db_user)
        .database(&cfg.db_name);
    if cfg.db_password.is_empty() {
        options
    } else {
        options.password(&cfg.db_password)
    }
}

#[async_trait]
impl MetricStore for Database {
    async fn ping(&self) -> Result<(), DbError> {
        self.probe().await.map_err(DbError::from)
    }

    async fn read_all(&self) -> Result<TabularResult, DbError> {
        debug!(sql = %self.select_sql, "Running read query");
        match &self.pool {
            DbPool::Mysql(pool) => {
                let rows = sqlx::query(&self.select_sql).fetch_all(pool).await?;
                Ok(mysql::tabulate(&rows)?)
            }
            DbPool::Sqlite(pool) => {
                let rows = sqlx::query(&self.select_sql).fetch_all(pool).await?;
                Ok(sqlite::tabulate(&rows)?)
            }
        }
    }

    async fn insert_metric(&self, record: &MetricRecord) -> Result<(), DbError> {
        let [room, time, metric, action] = record.values();
        let affected = match &self.pool {
            DbPool::Mysql(pool) => {
                sqlx::query(&self.insert_sql)
                    .bind(room)
                    .bind(time)
                    .bind(metric)
                    .bind(action)
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
            DbPool::Sqlite(pool) => {
                sqlx::query(&self.insert_sql)
                    .bind(room)
                    .bind(time)
                    .bind(metric)
                    .bind(action)
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
        };
        debug!(table = %self.table, affected, "Metric row inserted");
        Ok(())
    }

    async fn close(&self) {
        match &self.pool {
            DbPool::Mysql(pool) => pool.close().await,
            DbPool::Sqlite(pool) => pool.close().await,
        }
        info!("Database connection closed");
    }
}
