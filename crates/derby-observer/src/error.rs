//! Error types for the HTTP layer.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use derby_core::{ControlError, LobbyError};

/// Errors that can occur in the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The lobby refused the request.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// The request carried no visitor identity.
    #[error("missing visitor identity")]
    MissingVisitor,

    /// Force start is switched off in configuration.
    #[error("force start is disabled")]
    ForceStartDisabled,

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ControlError> for ObserverError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Rejected(e) => Self::Lobby(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl ObserverError {
    /// Stable machine-readable code for the response body.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Lobby(LobbyError::InvalidName { .. }) => "invalid_name",
            Self::Lobby(LobbyError::DuplicateName { .. }) => "duplicate_name",
            Self::Lobby(LobbyError::AlreadyJoined { .. }) => "already_joined",
            Self::Lobby(LobbyError::RaceInProgress) => "race_in_progress",
            Self::MissingVisitor => "missing_visitor",
            Self::ForceStartDisabled => "force_start_disabled",
            Self::Internal(_) => "internal",
        }
    }

    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Lobby(LobbyError::InvalidName { .. }) | Self::MissingVisitor => {
                StatusCode::BAD_REQUEST
            }
            Self::Lobby(_) => StatusCode::CONFLICT,
            Self::ForceStartDisabled => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_rejections_map_to_client_errors() {
        let invalid = ObserverError::from(LobbyError::InvalidName {
            reason: String::from("empty"),
        });
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.code(), "invalid_name");

        let running = ObserverError::from(LobbyError::RaceInProgress);
        assert_eq!(running.status(), StatusCode::CONFLICT);
        assert_eq!(running.code(), "race_in_progress");
    }

    #[test]
    fn control_rejection_unwraps_to_lobby_error() {
        let err = ObserverError::from(ControlError::Rejected(LobbyError::RaceInProgress));
        assert!(matches!(err, ObserverError::Lobby(LobbyError::RaceInProgress)));
    }

    #[test]
    fn other_control_errors_are_internal() {
        let err = ObserverError::from(ControlError::NoActiveRace);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
