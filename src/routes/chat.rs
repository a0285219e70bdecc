//! Room chat routes: the message log, reactions, and pruning.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        chat::{PrunedResponse, ReactionRequest, SendMessageRequest},
        rooms::{ActionResponse, PlayerActionRequest},
        snapshot::MessageView,
    },
    error::AppError,
    routes::room_code,
    services::chat_service,
    state::SharedState,
};

/// Configure the chat subtree.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{code}/messages", get(list_messages))
        .route("/rooms/{code}/messages", post(send_message))
        .route("/rooms/{code}/messages/prune", post(prune_messages))
        .route(
            "/rooms/{code}/messages/{id}/reactions",
            put(add_reaction),
        )
        .route(
            "/rooms/{code}/messages/{id}/reactions",
            delete(remove_reaction),
        )
}

/// Full message log of a room, oldest first.
#[utoipa::path(
    get,
    path = "/rooms/{code}/messages",
    tag = "chat",
    params(("code" = String, Path, description = "Join code of the room")),
    responses(
        (status = 200, description = "Message log", body = Vec<MessageView>)
    )
)]
pub async fn list_messages(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<MessageView>>, AppError> {
    let code = room_code(&code)?;
    let messages = chat_service::list_messages(&state, &code).await?;
    Ok(Json(messages))
}

/// Post a chat message.
#[utoipa::path(
    post,
    path = "/rooms/{code}/messages",
    tag = "chat",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message posted", body = MessageView)
    )
)]
pub async fn send_message(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<SendMessageRequest>>,
) -> Result<Json<MessageView>, AppError> {
    let code = room_code(&code)?;
    let message = chat_service::send_message(&state, &code, payload).await?;
    Ok(Json(message))
}

/// Prune the oldest chat entries, owner only.
#[utoipa::path(
    post,
    path = "/rooms/{code}/messages/prune",
    tag = "chat",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Messages pruned", body = PrunedResponse),
        (status = 403, description = "Caller is not the owner")
    )
)]
pub async fn prune_messages(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<PlayerActionRequest>,
) -> Result<Json<PrunedResponse>, AppError> {
    let code = room_code(&code)?;
    let response = chat_service::prune_messages(&state, &code, &payload.player_id).await?;
    Ok(Json(response))
}

/// Add an emoji reaction to a message.
#[utoipa::path(
    put,
    path = "/rooms/{code}/messages/{id}/reactions",
    tag = "chat",
    params(
        ("code" = String, Path, description = "Join code of the room"),
        ("id" = Uuid, Path, description = "Id of the message")
    ),
    request_body = ReactionRequest,
    responses(
        (status = 200, description = "Reaction set", body = ActionResponse)
    )
)]
pub async fn add_reaction(
    State(state): State<SharedState>,
    Path((code, id)): Path<(String, Uuid)>,
    Valid(Json(payload)): Valid<Json<ReactionRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    set_reaction(state, code, id, payload, true).await
}

/// Remove the caller's emoji reaction from a message.
#[utoipa::path(
    delete,
    path = "/rooms/{code}/messages/{id}/reactions",
    tag = "chat",
    params(
        ("code" = String, Path, description = "Join code of the room"),
        ("id" = Uuid, Path, description = "Id of the message")
    ),
    request_body = ReactionRequest,
    responses(
        (status = 200, description = "Reaction cleared", body = ActionResponse)
    )
)]
pub async fn remove_reaction(
    State(state): State<SharedState>,
    Path((code, id)): Path<(String, Uuid)>,
    Valid(Json(payload)): Valid<Json<ReactionRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    set_reaction(state, code, id, payload, false).await
}

async fn set_reaction(
    state: SharedState,
    code: String,
    id: Uuid,
    payload: ReactionRequest,
    present: bool,
) -> Result<Json<ActionResponse>, AppError> {
    let code = room_code(&code)?;
    let changed = chat_service::set_reaction(&state, &code, id, payload, present).await?;
    let message = if changed {
        "reaction updated"
    } else {
        "reaction unchanged"
    };
    Ok(Json(ActionResponse::new(message)))
}
