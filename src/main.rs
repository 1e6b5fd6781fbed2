use metric_relay::config::Config;
use metric_relay::db::{Database, MetricStore};
use metric_relay::error::StartupError;
use metric_relay::ingest;
use metric_relay::server::{RelayState, relay_router};
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Logging is configured from the file, so a config failure can only go to stderr.
    let config_path = Config::path_from_env();
    let cfg = match Config::from_json_file(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("metric-relay: {e}");
            return ExitCode::FAILURE;
        }
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let password_state = if cfg.db_password.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    };
    info!(
        config_path = %config_path.display(),
        driver = ?cfg.db_driver,
        db_address = %cfg.db_address,
        db_name = %cfg.db_name,
        db_table = %cfg.db_table,
        db_user = %cfg.db_user,
        db_password = password_state,
        trusted_proxies = ?cfg.trusted_proxies,
        listen_addr = %cfg.listen_addr,
        listen_port = cfg.listen_port,
        ingest_listen_addr = ?cfg.ingest_listen_addr,
        loglevel = %cfg.loglevel
    );

    match run(cfg).await {
        Ok(()) => {
            info!("Server has shut down gracefully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "metric-relay stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let trusted_proxies = cfg.parsed_trusted_proxies()?;
    let db = Arc::new(Database::connect(&cfg).await?);
    let store: Arc<dyn MetricStore> = db.clone();

    let ingest_task = match cfg.ingest_listen_addr {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|source| StartupError::Bind { addr, source })?;
            Some(tokio::spawn(ingest::serve(listener, store.clone())))
        }
        None => None,
    };

    let state = RelayState::new(store.clone(), trusted_proxies);
    let app = relay_router(state);

    let addr = cfg.listen_socket();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    info!("HTTP server listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(task) = ingest_task {
        task.abort();
    }
    if !db.is_closed() {
        store.close().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
