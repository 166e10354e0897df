//! Shared application state for the HTTP server.

use std::sync::Arc;

use derby_core::Controller;

/// State handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The lobby/race controller.
    pub controller: Arc<Controller>,
    /// Whether `POST /api/force-start` is enabled.
    pub allow_force_start: bool,
}

impl AppState {
    /// Wrap `controller`.
    pub const fn new(controller: Arc<Controller>, allow_force_start: bool) -> Self {
        Self {
            controller,
            allow_force_start,
        }
    }
}
