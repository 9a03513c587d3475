pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod models;
pub mod sanitize;
pub mod storage;
pub mod uploader;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::ApiContext;
use crate::config::{ConfigError, IntakeConfig};
use crate::db::{DatabaseError, RecordStore};
use crate::storage::{FilesystemBackend, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Object storage unavailable: {0}")]
    Storage(#[from] StorageError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the intake service and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = IntakeConfig::from_env()?;

    let store = RecordStore::open(&config.database_path)?;
    tracing::info!(path = %config.database_path.display(), "Record store ready");

    let backend = FilesystemBackend::new(&config.storage_dir, &config.public_base_url);
    backend.validate().await?;
    tracing::info!(
        dir = %config.storage_dir.display(),
        public_base_url = %config.public_base_url,
        "Object storage ready"
    );

    let ctx = ApiContext::new(store, Arc::new(backend));
    let mut server = api::start_intake_server(ctx, &config).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, stopping");
    server.shutdown();
    server.stopped().await;
    Ok(())
}
