use std::{net::SocketAddr, path::PathBuf};
use thiserror::Error as ThisError;

/// Fatal errors raised before the server accepts traffic. There is no degraded mode.
#[derive(Debug, ThisError)]
pub enum StartupError {
    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("failed to extract configuration from {}: {source}", path.display())]
    ConfigMalformed {
        path: PathBuf,
        #[source]
        source: Box<figment::Error>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("database connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
