//! Server-sent event routes.

use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, routes::room_code, services::sse_service, state::SharedState};

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/rooms/{code}", get(room_stream))
        .route("/sse/lobby", get(lobby_stream))
}

#[utoipa::path(
    get,
    path = "/sse/rooms/{code}",
    tag = "sse",
    params(("code" = String, Path, description = "Join code of the room")),
    responses((status = 200, description = "Room event stream", content_type = "text/event-stream", body = String))
)]
/// Stream a room's snapshots, chat events, and status changes.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let code = room_code(&code)?;
    let stream = sse_service::room_stream(&state, &code).await?;
    info!(code = %code, "new room SSE connection");
    Ok(stream)
}

#[utoipa::path(
    get,
    path = "/sse/lobby",
    tag = "sse",
    responses((status = 200, description = "Lobby event stream", content_type = "text/event-stream", body = String))
)]
/// Stream the public room list and status changes for the lobby browser.
pub async fn lobby_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let stream = sse_service::lobby_stream(&state).await?;
    info!("new lobby SSE connection");
    Ok(stream)
}
