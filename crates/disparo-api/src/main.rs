use std::sync::Arc;

use disparo_api::{routes, AppState};
use disparo_core::Config;
use disparo_db::{BroadcastRepository, VoterRepository};
use disparo_engine::DispatchEngine;
use disparo_storage::create_storage;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    disparo_db::MIGRATOR.run(&pool).await?;

    let storage = create_storage(&config).await?;
    tracing::info!(backend = %storage.backend_type(), "Storage initialized");

    let engine = DispatchEngine::new(
        storage,
        Arc::new(VoterRepository::new(pool.clone())),
        Arc::new(BroadcastRepository::new(pool.clone())),
        config.upload_policy.clone(),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        engine,
        pool,
    });
    let app = routes(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    tracing::info!(
        addr = %addr,
        max_file_mb = config.upload_policy.max_file_size_bytes / 1024 / 1024,
        direct_threshold_mb = config.upload_policy.direct_threshold_bytes / 1024 / 1024,
        chunk_mb = config.upload_policy.chunk_size_bytes / 1024 / 1024,
        max_concurrent_uploads = config.upload_policy.max_concurrent_uploads,
        "Server ready and accepting connections"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Listens for Ctrl+C (SIGINT) and SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
