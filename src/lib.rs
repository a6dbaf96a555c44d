pub mod activity_log;
pub mod allocation;
pub mod analysis;
pub mod api;
pub mod campaigns;
pub mod config;
pub mod core_state; // Shared state behind every handler
pub mod crud;
pub mod db;
pub mod defaulters;
pub mod export;
pub mod generator;
pub mod inventory;
pub mod loader;
pub mod models;
pub mod notify;
pub mod operations;
pub mod patients;
pub mod pipeline; // Filter → aggregate → paginate
pub mod vaccinations;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::core_state::{CoreError, CoreState};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
}

pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("VaxTrack starting v{}", config::APP_VERSION);

    if let Err(e) = start(Settings::from_env()) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn start(settings: Settings) -> Result<(), StartupError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(settings))
}

/// Open the store, serve the API and wait for Ctrl-C.
async fn serve(settings: Settings) -> Result<(), StartupError> {
    let addr = settings.bind_addr;
    let core = Arc::new(CoreState::open(settings)?);
    let server = api::start_server(Arc::clone(&core), addr).await?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }

    core.operations.cancel_all();
    server.stop().await;
    Ok(())
}
