//! HTTP surface of the backend.

use axum::Router;

use crate::{
    dao::models::RoomCode, dto::validation::validate_room_code, error::AppError,
    state::SharedState,
};

pub mod chat;
pub mod docs;
pub mod game;
pub mod health;
pub mod lobby;
pub mod rooms;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(rooms::router())
        .merge(game::router())
        .merge(chat::router())
        .merge(lobby::router())
        .merge(sse::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

/// Parse and validate a room code path segment.
pub(crate) fn room_code(raw: &str) -> Result<RoomCode, AppError> {
    validate_room_code(raw).map_err(|err| {
        let message = err
            .message
            .map(|m| m.to_string())
            .unwrap_or_else(|| "invalid room code".to_string());
        AppError::BadRequest(message)
    })?;
    Ok(RoomCode::new(raw))
}
