//! Public room discovery route.

use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::rooms::PublicRoomsResponse, error::AppError, services::lobby_service, state::SharedState,
};

/// Configure the lobby browser subtree.
pub fn router() -> Router<SharedState> {
    Router::new().route("/rooms", get(public_rooms))
}

/// List every discoverable room, most populated first.
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "lobby",
    responses(
        (status = 200, description = "Discoverable rooms", body = PublicRoomsResponse)
    )
)]
pub async fn public_rooms(
    State(state): State<SharedState>,
) -> Result<Json<PublicRoomsResponse>, AppError> {
    let rooms = lobby_service::get_public_rooms(&state).await?;
    Ok(Json(rooms))
}
