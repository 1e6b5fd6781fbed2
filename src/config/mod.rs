mod proxies;

pub use proxies::TrustedProxy;

use crate::db::{PoolLimits, TableRef};
use crate::error::StartupError;
use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "RELAY_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Which sqlx driver backs the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DbDriver {
    #[default]
    Mysql,
    Sqlite,
}

/// Application configuration managed by Figment.
///
/// Keys keep the PascalCase names of the JSON file (`DBAddress`, `DBTable`, ...). Immutable once
/// loaded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// JSON: `DBDriver`. `"mysql"` (default) or `"sqlite"`.
    #[serde(rename = "DBDriver", default)]
    pub db_driver: DbDriver,

    /// MySQL: `host[:port]`. SQLite: database file path or `:memory:`.
    /// JSON: `DBAddress`.
    #[serde(rename = "DBAddress", default)]
    pub db_address: String,

    /// Schema (database) name. Ignored by SQLite.
    /// JSON: `DBName`.
    #[serde(rename = "DBName", default)]
    pub db_name: String,

    /// Table that `/test` reads from and `/metric` inserts into.
    /// JSON: `DBTable`.
    #[serde(rename = "DBTable", default)]
    pub db_table: String,

    #[serde(rename = "DBUser", default)]
    pub db_user: String,

    #[serde(rename = "DBPassword", default)]
    pub db_password: String,

    /// Reverse proxies whose `X-Forwarded-For` is believed. IPs or CIDR blocks.
    /// JSON: `TrustedProxies`. Default: empty.
    #[serde(rename = "TrustedProxies", default)]
    pub trusted_proxies: Vec<String>,

    /// Idle connections are dropped after this many minutes; `0` keeps them.
    /// JSON: `DBMaxIdleTimeMinutes`.
    #[serde(rename = "DBMaxIdleTimeMinutes", default)]
    pub db_max_idle_time_minutes: u64,

    /// JSON: `DBMaxOpenConns`. `0` keeps the driver default.
    #[serde(rename = "DBMaxOpenConns", default)]
    pub db_max_open_conns: u32,

    /// JSON: `DBMaxIdleConns`.
    #[serde(rename = "DBMaxIdleConns", default)]
    pub db_max_idle_conns: u32,

    /// Tables `DBTable` may name. Empty disables the check.
    /// JSON: `AllowedTables`.
    #[serde(rename = "AllowedTables", default)]
    pub allowed_tables: Vec<String>,

    /// JSON: `ListenAddr`. Default: `0.0.0.0`.
    #[serde(rename = "ListenAddr", default = "default_listen_ip")]
    pub listen_addr: IpAddr,

    /// JSON: `ListenPort`. Default: `8080`.
    #[serde(rename = "ListenPort", default = "default_listen_port")]
    pub listen_port: u16,

    /// Log level used when `RUST_LOG` is unset.
    /// JSON: `LogLevel`. Default: `info`.
    #[serde(rename = "LogLevel", default = "default_loglevel")]
    pub loglevel: String,

    /// TCP metric listener (one JSON object per connection). Disabled when unset.
    /// JSON: `IngestListenAddr`. Example: `0.0.0.0:9999`.
    #[serde(rename = "IngestListenAddr", default)]
    pub ingest_listen_addr: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_driver: DbDriver::default(),
            db_address: "127.0.0.1:3306".to_string(),
            db_name: String::new(),
            db_table: String::new(),
            db_user: String::new(),
            db_password: String::new(),
            trusted_proxies: Vec::new(),
            db_max_idle_time_minutes: 0,
            db_max_open_conns: 0,
            db_max_idle_conns: 0,
            allowed_tables: Vec::new(),
            listen_addr: default_listen_ip(),
            listen_port: default_listen_port(),
            loglevel: default_loglevel(),
            ingest_listen_addr: None,
        }
    }
}

impl Config {
    /// Config file path: `$RELAY_CONFIG`, falling back to `config.json`.
    pub fn path_from_env() -> PathBuf {
        env::var_os(CONFIG_PATH_ENV)
            .filter(|v| !v.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
    }

    /// Builds a Figment that merges defaults and the given JSON file.
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Json::file(path))
    }

    /// Loads and validates configuration from a JSON file. The file must exist.
    pub fn from_json_file(path: &Path) -> Result<Self, StartupError> {
        if !path.is_file() {
            return Err(StartupError::ConfigNotFound(path.to_path_buf()));
        }
        let cfg: Self =
            Self::figment(path)
                .extract()
                .map_err(|err| StartupError::ConfigMalformed {
                    path: path.to_path_buf(),
                    source: Box::new(err),
                })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        self.table_ref()?;
        self.parsed_trusted_proxies()?;
        Ok(())
    }

    /// Validated target table. Identifiers cannot be bound as parameters, so they are checked
    /// here instead: plain identifier syntax plus membership in `AllowedTables` when set.
    pub fn table_ref(&self) -> Result<TableRef, StartupError> {
        if !self.allowed_tables.is_empty() && !self.allowed_tables.contains(&self.db_table) {
            return Err(StartupError::InvalidConfig(format!(
                "DBTable '{}' is not listed in AllowedTables",
                self.db_table
            )));
        }
        let schema = match self.db_driver {
            DbDriver::Mysql => Some(self.db_name.as_str()),
            DbDriver::Sqlite => None,
        };
        TableRef::new(schema, &self.db_table)
            .map_err(|e| StartupError::InvalidConfig(e.to_string()))
    }

    pub fn pool_limits(&self) -> PoolLimits {
        PoolLimits::new(
            self.db_max_open_conns,
            self.db_max_idle_conns,
            self.db_max_idle_time_minutes,
        )
    }

    pub fn parsed_trusted_proxies(&self) -> Result<Vec<TrustedProxy>, StartupError> {
        self.trusted_proxies
            .iter()
            .map(|raw| {
                raw.parse::<TrustedProxy>()
                    .map_err(|e| StartupError::InvalidConfig(format!("TrustedProxies: {e}")))
            })
            .collect()
    }

    pub fn listen_socket(&self) -> SocketAddr {
        SocketAddr::from((self.listen_addr, self.listen_port))
    }
}

/// Default IP address for the HTTP server listen address.
fn default_listen_ip() -> IpAddr {
    Ipv4Addr::new(0, 0, 0, 0).into()
}

/// Default port for the HTTP server.
fn default_listen_port() -> u16 {
    8080
}

fn default_loglevel() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mysql_config() -> Config {
        Config {
            db_name: "devdb".into(),
            db_table: "testextron".into(),
            ..Config::default()
        }
    }

    #[test]
    fn mysql_table_is_schema_qualified() {
        let table = mysql_config().table_ref().unwrap();
        assert_eq!(table.quoted_mysql(), "`devdb`.`testextron`");
    }

    #[test]
    fn allowlist_rejects_unlisted_table() {
        let cfg = Config {
            allowed_tables: vec!["metrics".into()],
            ..mysql_config()
        };
        let err = cfg.table_ref().unwrap_err();
        assert!(err.to_string().contains("not listed in AllowedTables"));
    }

    #[test]
    fn allowlist_accepts_listed_table() {
        let cfg = Config {
            allowed_tables: vec!["other".into(), "testextron".into()],
            ..mysql_config()
        };
        assert!(cfg.table_ref().is_ok());
    }

    #[test]
    fn injected_table_name_is_rejected() {
        let cfg = Config {
            db_table: "t; DROP TABLE users".into(),
            ..mysql_config()
        };
        assert!(matches!(
            cfg.validate(),
            Err(StartupError::InvalidConfig(_))
        ));
    }

    #[test]
    fn sqlite_ignores_schema_name() {
        let cfg = Config {
            db_driver: DbDriver::Sqlite,
            db_name: String::new(),
            db_table: "metrics".into(),
            ..Config::default()
        };
        assert_eq!(cfg.table_ref().unwrap().quoted_sqlite(), "\"metrics\"");
    }

    #[test]
    fn bad_trusted_proxy_fails_validation() {
        let cfg = Config {
            trusted_proxies: vec!["10.0.0.0/8".into(), "not-an-ip".into()],
            ..mysql_config()
        };
        assert!(cfg.validate().is_err());
    }
}
