use std::sync::Arc;

use laundry_orders::api;
use laundry_orders::config::{Config, LogFormat};
use laundry_orders::error::AppError;
use laundry_orders::state::AppState;
use laundry_orders::store::memory::{MemoryDirectory, MemoryOrderStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let directory = match &config.directory_seed {
        Some(path) => {
            let directory = MemoryDirectory::load_seed(path).await?;
            tracing::info!(seed = %path.display(), "directory seeded");
            directory
        }
        None => {
            tracing::warn!("no DIRECTORY_SEED set; user and address lookups start empty");
            MemoryDirectory::new()
        }
    };

    let state = AppState::from_config(
        &config,
        Arc::new(MemoryOrderStore::new()),
        Arc::new(directory),
    );
    let app = api::rest::router(Arc::new(state));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        rating_requires_terminal = config.rating_requires_terminal,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
