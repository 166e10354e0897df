//! Server startup helper for embedding in the engine binary.
//!
//! [`spawn_observer`] binds eagerly, so a taken port fails startup instead
//! of surfacing later from a background task, then serves on a spawned
//! Tokio task.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError, bind, serve};
use crate::state::AppState;

/// Errors that can occur when spawning the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Bind `config` and serve the API on a background task.
///
/// The caller should hold the returned handle and abort or await it
/// during shutdown.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address cannot be bound.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<JoinHandle<()>, StartupError> {
    let listener = bind(config).await?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!(error = %e, "HTTP server exited with error");
        }
    });

    tracing::info!(host = config.host, port = config.port, "HTTP server spawned on background task");

    Ok(handle)
}
