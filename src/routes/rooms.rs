//! Room lifecycle routes: creation, membership, presence, and owner
//! settings.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::{
        rooms::{
            ActionResponse, CreateRoomRequest, CreateRoomResponse, JoinRoomRequest,
            KickPlayerRequest, OwnershipResponse, PlayerActionRequest, PruneStaleResponse,
            SetCustomWordsRequest, SetLockedRequest, SetRoomNameRequest, SetTimerRequest,
            SetWordPacksRequest,
        },
        snapshot::RoomSnapshot,
    },
    error::AppError,
    routes::room_code,
    services::{janitor, ownership, room_service},
    state::SharedState,
};

/// Configure the room lifecycle subtree.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{code}", get(get_room))
        .route("/rooms/{code}/join", post(join_room))
        .route("/rooms/{code}/leave", post(leave_room))
        .route("/rooms/{code}/heartbeat", post(heartbeat))
        .route("/rooms/{code}/reassign-owner", post(reassign_owner))
        .route("/rooms/{code}/kick", post(kick_player))
        .route("/rooms/{code}/prune-stale", post(prune_stale))
        .route("/rooms/{code}/locked", put(set_locked))
        .route("/rooms/{code}/name", put(set_room_name))
        .route("/rooms/{code}/timer", put(set_timer))
        .route("/rooms/{code}/word-packs", put(set_word_packs))
        .route("/rooms/{code}/custom-words", put(set_custom_words))
}

/// Create a room under a freshly generated join code.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = CreateRoomResponse)
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<Json<CreateRoomResponse>, AppError> {
    let (code, room) = room_service::create_room(&state, payload).await?;
    Ok(Json(CreateRoomResponse {
        code: code.as_str().to_string(),
        room,
    }))
}

/// Current snapshot of a room.
#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    responses(
        (status = 200, description = "Room snapshot", body = RoomSnapshot),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let snapshot = room_service::room_snapshot(&state, &code).await?;
    Ok(Json(snapshot))
}

/// Join a room by code, creating it when the code is free.
#[utoipa::path(
    post,
    path = "/rooms/{code}/join",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Joined", body = RoomSnapshot),
        (status = 403, description = "Temporarily banned"),
        (status = 409, description = "Room locked or full")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinRoomRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let snapshot = room_service::join_room(&state, &code, payload).await?;
    Ok(Json(snapshot))
}

/// Leave a room explicitly, surrendering the owner seat immediately.
#[utoipa::path(
    post,
    path = "/rooms/{code}/leave",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Left the room", body = ActionResponse)
    )
)]
pub async fn leave_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let code = room_code(&code)?;
    room_service::leave_room(&state, &code, &payload.player_id).await?;
    Ok(Json(ActionResponse::new("left room")))
}

/// Record a presence heartbeat for the player.
#[utoipa::path(
    post,
    path = "/rooms/{code}/heartbeat",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Heartbeat recorded", body = ActionResponse)
    )
)]
pub async fn heartbeat(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let code = room_code(&code)?;
    room_service::heartbeat(&state, &code, &payload.player_id).await?;
    Ok(Json(ActionResponse::new("heartbeat recorded")))
}

/// Trigger an ownership check, transferring the seat when the owner is gone.
#[utoipa::path(
    post,
    path = "/rooms/{code}/reassign-owner",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    responses(
        (status = 200, description = "Ownership outcome", body = OwnershipResponse)
    )
)]
pub async fn reassign_owner(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<OwnershipResponse>, AppError> {
    let code = room_code(&code)?;
    let outcome = ownership::reassign_owner_if_needed(&state, &code, false, true).await?;
    Ok(Json(outcome))
}

/// Remove a player from the room with a temporary ban.
#[utoipa::path(
    post,
    path = "/rooms/{code}/kick",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = KickPlayerRequest,
    responses(
        (status = 200, description = "Player removed", body = RoomSnapshot),
        (status = 403, description = "Caller is not the owner")
    )
)]
pub async fn kick_player(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<KickPlayerRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let snapshot = room_service::kick_player(&state, &code, payload).await?;
    Ok(Json(snapshot))
}

/// Demote long-disconnected players to spectators.
#[utoipa::path(
    post,
    path = "/rooms/{code}/prune-stale",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Stale players demoted", body = PruneStaleResponse),
        (status = 403, description = "Caller is not the owner")
    )
)]
pub async fn prune_stale(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerActionRequest>,
) -> Result<Json<PruneStaleResponse>, AppError> {
    let code = room_code(&code)?;
    let response = janitor::prune_stale_players(&state, &code, &payload.player_id).await?;
    Ok(Json(response))
}

/// Lock or unlock the room against new joins.
#[utoipa::path(
    put,
    path = "/rooms/{code}/locked",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = SetLockedRequest,
    responses(
        (status = 200, description = "Lock updated", body = RoomSnapshot)
    )
)]
pub async fn set_locked(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<SetLockedRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let snapshot = room_service::set_locked(&state, &code, payload).await?;
    Ok(Json(snapshot))
}

/// Rename the room.
#[utoipa::path(
    put,
    path = "/rooms/{code}/name",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = SetRoomNameRequest,
    responses(
        (status = 200, description = "Room renamed", body = RoomSnapshot)
    )
)]
pub async fn set_room_name(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<SetRoomNameRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let snapshot = room_service::set_room_name(&state, &code, payload).await?;
    Ok(Json(snapshot))
}

/// Select the turn timer preset.
#[utoipa::path(
    put,
    path = "/rooms/{code}/timer",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = SetTimerRequest,
    responses(
        (status = 200, description = "Timer updated", body = RoomSnapshot)
    )
)]
pub async fn set_timer(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<SetTimerRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let snapshot = room_service::set_timer(&state, &code, payload).await?;
    Ok(Json(snapshot))
}

/// Select the word packs used for board generation.
#[utoipa::path(
    put,
    path = "/rooms/{code}/word-packs",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = SetWordPacksRequest,
    responses(
        (status = 200, description = "Word packs updated", body = RoomSnapshot)
    )
)]
pub async fn set_word_packs(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<SetWordPacksRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let snapshot = room_service::set_word_packs(&state, &code, payload).await?;
    Ok(Json(snapshot))
}

/// Replace the room's custom word list.
#[utoipa::path(
    put,
    path = "/rooms/{code}/custom-words",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = SetCustomWordsRequest,
    responses(
        (status = 200, description = "Custom words updated", body = RoomSnapshot)
    )
)]
pub async fn set_custom_words(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<SetCustomWordsRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let snapshot = room_service::set_custom_words(&state, &code, payload).await?;
    Ok(Json(snapshot))
}
