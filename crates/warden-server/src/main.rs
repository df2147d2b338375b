//! pg_warden server - main entry point

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use tokio::signal;
use tracing::info;
use warden_common::logging::{init_logging, LogConfig};

use warden_server::{
    api::{self, AppState},
    audit::{self, pg::AuditWriter, AuditLog},
    config::{Config, StoreKind, DEFAULT_AUDIT_HISTORY_LIMIT},
    store::PgStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment variables take precedence
    let log_config = LogConfig::for_service(
        "warden-server",
        "warden_server=debug,tower_http=debug,sqlx=warn",
    )
    .with_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting pg_warden server");

    let config = Config::load()?;
    info!(
        store = %config.warden.store,
        access_path = %config.warden.access_path,
        enforcement = %config.warden.enforcement,
        "Configuration loaded - server will bind to {}:{}",
        config.server.host,
        config.server.port
    );

    let (state, audit_writer) = match config.warden.store {
        StoreKind::Memory => {
            info!("Using the in-memory demo store");
            (AppState::in_memory(config.clone()), None)
        },
        StoreKind::Postgres => {
            let (state, writer) = connect_postgres(config.clone()).await?;
            (state, Some(writer))
        },
    };

    let app = api::create_router(state);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    if let Some(writer) = audit_writer {
        let stats = writer.shutdown().await;
        info!(
            written = stats.written,
            failed = stats.failed,
            "Audit queue flushed"
        );
    }

    info!("Server shut down gracefully");

    Ok(())
}

/// Connect, migrate, restore recent audit history and start the audit
/// writer.
async fn connect_postgres(config: Config) -> Result<(AppState, AuditWriter)> {
    let store = PgStore::connect(&config.database).await?;
    info!("Database connection pool established");

    sqlx::migrate!("../../migrations")
        .run(store.pool())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrations completed");

    let history = audit::pg::load_recent(store.pool(), DEFAULT_AUDIT_HISTORY_LIMIT).await?;
    info!(records = history.len(), "Audit history restored");

    let (sink, writer) = audit::pg::spawn_writer(store.pool().clone());
    let audit_log = AuditLog::new()
        .with_retention(config.warden.audit_retention)
        .with_history(history)
        .with_sink(sink);

    Ok((AppState::new(config, Arc::new(store), audit_log), writer))
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
