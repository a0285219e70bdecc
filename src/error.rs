use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{dao::storage::StoreError, state::phase::InvalidTransition};

/// Typed failures returned by game service operations.
#[derive(Debug, Error)]
pub enum GameError {
    /// Room or player does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The acting player is not the room owner.
    #[error("only the room owner may do this")]
    NotOwner,
    /// The acting player exists but lacks the standing for this action.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The acting player is temporarily banned from the room.
    #[error("banned from this room for another {remaining_secs}s")]
    Banned {
        /// Seconds until the ban expires.
        remaining_secs: u64,
    },
    /// The room rejects new players while locked.
    #[error("room is locked")]
    RoomLocked,
    /// The room is at capacity.
    #[error("room is full")]
    RoomFull,
    /// The operation is not allowed in the room's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A client-supplied value failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A reveal was confirmed without the required vote quorum.
    #[error("not enough votes: have {have}, need {need}")]
    InsufficientVotes {
        /// Votes currently on the card.
        have: usize,
        /// Quorum required for this team.
        need: usize,
    },
    /// The card was already revealed, usually by a racing confirmer. An
    /// expected outcome of concurrent play, never logged as an error.
    #[error("card already revealed")]
    AlreadyRevealed,
    /// Application is running in degraded mode without a store.
    #[error("store unavailable (degraded mode)")]
    Degraded,
    /// Storage backend failed.
    #[error("store unavailable")]
    Unavailable(#[from] StoreError),
}

impl From<InvalidTransition> for GameError {
    fn from(err: InvalidTransition) -> Self {
        GameError::InvalidState(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The caller lacks permission for the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<GameError> for AppError {
    fn from(err: GameError) -> Self {
        let message = err.to_string();
        match err {
            GameError::NotFound(_) => AppError::NotFound(message),
            GameError::NotOwner | GameError::Forbidden(_) | GameError::Banned { .. } => {
                AppError::Forbidden(message)
            }
            GameError::RoomLocked
            | GameError::RoomFull
            | GameError::InvalidState(_)
            | GameError::InsufficientVotes { .. }
            | GameError::AlreadyRevealed => AppError::Conflict(message),
            GameError::InvalidInput(_) => AppError::BadRequest(message),
            GameError::Degraded | GameError::Unavailable(_) => {
                AppError::ServiceUnavailable(message)
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
