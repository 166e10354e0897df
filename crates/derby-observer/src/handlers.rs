//! REST endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/join` | Join the open lobby |
//! | `POST` | `/api/force-start` | Start the race now (dev only) |
//! | `GET` | `/api/state` | Whole-system snapshot |
//! | `GET` | `/api/lobby` | Lobby view for the caller |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use derby_types::{JoinReceipt, LobbySnapshot, RaceStarted, StateSnapshot};
use tracing::debug;

use crate::error::ObserverError;
use crate::state::AppState;
use crate::visitor::Visitor;

/// Body of `POST /api/join`.
#[derive(Debug, serde::Deserialize)]
pub struct JoinRequest {
    /// Requested display name, trimmed by the lobby.
    pub name: String,
}

/// Join the open lobby as the calling visitor.
pub async fn join(
    State(state): State<Arc<AppState>>,
    Visitor(visitor): Visitor,
    Json(body): Json<JoinRequest>,
) -> Result<Json<JoinReceipt>, ObserverError> {
    debug!(%visitor, name = body.name, "join requested");
    let receipt = state.controller.join(&body.name, &visitor).await?;
    Ok(Json(receipt))
}

/// Close the lobby and start the race immediately.
pub async fn force_start(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RaceStarted>, ObserverError> {
    if !state.allow_force_start {
        return Err(ObserverError::ForceStartDisabled);
    }
    let started = state.controller.force_start().await?;
    Ok(Json(started))
}

/// Current phase with whatever data that phase carries.
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateSnapshot> {
    Json(state.controller.state_snapshot().await)
}

/// The open lobby as the calling visitor sees it.
pub async fn get_lobby(
    State(state): State<Arc<AppState>>,
    Visitor(visitor): Visitor,
) -> Result<Json<LobbySnapshot>, ObserverError> {
    let snapshot = state.controller.lobby_snapshot_for(&visitor).await?;
    Ok(Json(snapshot))
}
