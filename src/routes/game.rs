//! Gameplay routes: lifecycle transitions, seating, and the turn engine.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::{
        game::{CardActionRequest, GiveClueRequest, RevealResponse, SetRoleRequest, VoteResponse},
        rooms::PlayerActionRequest,
        snapshot::RoomSnapshot,
    },
    error::AppError,
    routes::room_code,
    services::{game_service, team_service, turn_service},
    state::SharedState,
};

/// Configure the gameplay subtree.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{code}/game/start", post(start_game))
        .route("/rooms/{code}/game/rematch", post(rematch))
        .route("/rooms/{code}/game/end", post(end_game))
        .route("/rooms/{code}/game/pause", post(pause_game))
        .route("/rooms/{code}/game/resume", post(resume_game))
        .route("/rooms/{code}/game/role", post(set_role))
        .route("/rooms/{code}/game/randomize", post(randomize_teams))
        .route("/rooms/{code}/game/clue", post(give_clue))
        .route("/rooms/{code}/game/vote", post(vote_card))
        .route("/rooms/{code}/game/reveal", post(confirm_reveal))
        .route("/rooms/{code}/game/end-turn", post(end_turn))
}

/// Start a game from the lobby.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game/start",
    tag = "game",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Game started", body = RoomSnapshot),
        (status = 409, description = "Lobby is not ready to start")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerActionRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let room = game_service::start_game(&state, &code, &payload.player_id).await?;
    Ok(Json(RoomSnapshot::from(room)))
}

/// Start a fresh game after a finished one, keeping the room settings.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game/rematch",
    tag = "game",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Rematch started", body = RoomSnapshot)
    )
)]
pub async fn rematch(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerActionRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let room = game_service::rematch(&state, &code, &payload.player_id).await?;
    Ok(Json(RoomSnapshot::from(room)))
}

/// Abort the running game and return the room to the lobby.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game/end",
    tag = "game",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Game ended", body = RoomSnapshot)
    )
)]
pub async fn end_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerActionRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let room = game_service::end_game(&state, &code, &payload.player_id).await?;
    Ok(Json(RoomSnapshot::from(room)))
}

/// Pause the running game.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game/pause",
    tag = "game",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Game paused", body = RoomSnapshot)
    )
)]
pub async fn pause_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerActionRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let room = game_service::pause_game(&state, &code, &payload.player_id).await?;
    Ok(Json(RoomSnapshot::from(room)))
}

/// Resume a paused game.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game/resume",
    tag = "game",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Game resumed", body = RoomSnapshot),
        (status = 409, description = "Pause condition still holds")
    )
)]
pub async fn resume_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerActionRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let room = game_service::resume_game(&state, &code, &payload.player_id).await?;
    Ok(Json(RoomSnapshot::from(room)))
}

/// Assign or clear a player's team and role.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game/role",
    tag = "game",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Seat updated", body = RoomSnapshot),
        (status = 409, description = "Seat change not allowed in this phase")
    )
)]
pub async fn set_role(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let snapshot = team_service::set_lobby_role(&state, &code, payload).await?;
    Ok(Json(snapshot))
}

/// Shuffle everyone into two staffed teams.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game/randomize",
    tag = "game",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Teams randomized", body = RoomSnapshot)
    )
)]
pub async fn randomize_teams(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerActionRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let snapshot = team_service::randomize_teams(&state, &code, &payload.player_id).await?;
    Ok(Json(snapshot))
}

/// Submit the clue opening the current team's guessing window.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game/clue",
    tag = "game",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = GiveClueRequest,
    responses(
        (status = 200, description = "Clue accepted", body = RoomSnapshot),
        (status = 400, description = "Clue word rejected")
    )
)]
pub async fn give_clue(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<GiveClueRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let room = turn_service::give_clue(&state, &code, payload).await?;
    Ok(Json(RoomSnapshot::from(room)))
}

/// Toggle the caller's vote on a board card.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game/vote",
    tag = "game",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = CardActionRequest,
    responses(
        (status = 200, description = "Vote toggled", body = VoteResponse)
    )
)]
pub async fn vote_card(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<CardActionRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    let code = room_code(&code)?;
    let response = turn_service::vote_card(&state, &code, payload).await?;
    Ok(Json(response))
}

/// Confirm a reveal once the vote quorum is reached.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game/reveal",
    tag = "game",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = CardActionRequest,
    responses(
        (status = 200, description = "Card revealed", body = RevealResponse),
        (status = 409, description = "Quorum missing or card already revealed")
    )
)]
pub async fn confirm_reveal(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<CardActionRequest>,
) -> Result<Json<RevealResponse>, AppError> {
    let code = room_code(&code)?;
    let response = turn_service::confirm_reveal(&state, &code, payload).await?;
    Ok(Json(response))
}

/// Pass the turn without revealing another card.
#[utoipa::path(
    post,
    path = "/rooms/{code}/game/end-turn",
    tag = "game",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Turn passed", body = RoomSnapshot)
    )
)]
pub async fn end_turn(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerActionRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let code = room_code(&code)?;
    let room = turn_service::end_turn(&state, &code, &payload.player_id).await?;
    Ok(Json(RoomSnapshot::from(room)))
}
