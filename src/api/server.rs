//! Intake API server lifecycle: bind → spawn background task → return
//! handle with shutdown channel.

use std::net::SocketAddr;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::intake_router;
use crate::api::types::ApiContext;
use crate::config::IntakeConfig;

// ═══════════════════════════════════════════════════════════
// Public types
// ═══════════════════════════════════════════════════════════

/// Handle to a running intake API server.
pub struct IntakeServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl IntakeServer {
    /// Shut down the server gracefully.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Intake server shutdown signal sent");
        }
    }

    /// Wait for the server task to finish.
    pub async fn stopped(self) {
        if let Err(e) = self.task.await {
            tracing::error!("Intake server task failed: {e}");
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Server lifecycle
// ═══════════════════════════════════════════════════════════

/// Start the intake API server on the configured address and port.
pub async fn start_intake_server(
    ctx: ApiContext,
    config: &IntakeConfig,
) -> Result<IntakeServer, std::io::Error> {
    start_intake_server_on(ctx, config, SocketAddr::new(config.bind_addr, config.port)).await
}

/// Start the intake API server on a specific socket address.
///
/// Factored out from `start_intake_server` so tests can bind port 0.
pub async fn start_intake_server_on(
    ctx: ApiContext,
    config: &IntakeConfig,
    addr: SocketAddr,
) -> Result<IntakeServer, std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    let app = intake_router(ctx, config);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("Intake server received shutdown signal");
        };

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Intake server error: {e}");
        }

        tracing::info!("Intake server stopped");
    });

    tracing::info!(%addr, "Intake server started");

    Ok(IntakeServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
