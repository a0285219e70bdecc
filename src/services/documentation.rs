use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the ClueGrid backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::lobby::public_rooms,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::leave_room,
        crate::routes::rooms::heartbeat,
        crate::routes::rooms::reassign_owner,
        crate::routes::rooms::kick_player,
        crate::routes::rooms::prune_stale,
        crate::routes::rooms::set_locked,
        crate::routes::rooms::set_room_name,
        crate::routes::rooms::set_timer,
        crate::routes::rooms::set_word_packs,
        crate::routes::rooms::set_custom_words,
        crate::routes::game::start_game,
        crate::routes::game::rematch,
        crate::routes::game::end_game,
        crate::routes::game::pause_game,
        crate::routes::game::resume_game,
        crate::routes::game::set_role,
        crate::routes::game::randomize_teams,
        crate::routes::game::give_clue,
        crate::routes::game::vote_card,
        crate::routes::game::confirm_reveal,
        crate::routes::game::end_turn,
        crate::routes::chat::list_messages,
        crate::routes::chat::send_message,
        crate::routes::chat::prune_messages,
        crate::routes::chat::add_reaction,
        crate::routes::chat::remove_reaction,
        crate::routes::sse::room_stream,
        crate::routes::sse::lobby_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::rooms::ActionResponse,
            crate::dto::rooms::CreateRoomRequest,
            crate::dto::rooms::CreateRoomResponse,
            crate::dto::rooms::JoinRoomRequest,
            crate::dto::rooms::PlayerActionRequest,
            crate::dto::rooms::SetLockedRequest,
            crate::dto::rooms::SetRoomNameRequest,
            crate::dto::rooms::SetTimerRequest,
            crate::dto::rooms::SetWordPacksRequest,
            crate::dto::rooms::SetCustomWordsRequest,
            crate::dto::rooms::KickPlayerRequest,
            crate::dto::rooms::OwnershipResponse,
            crate::dto::rooms::PruneStaleResponse,
            crate::dto::rooms::PublicRoomView,
            crate::dto::rooms::PublicRoomsResponse,
            crate::dto::game::SetRoleRequest,
            crate::dto::game::GiveClueRequest,
            crate::dto::game::CardActionRequest,
            crate::dto::game::VoteResponse,
            crate::dto::game::RevealResponse,
            crate::dto::chat::SendMessageRequest,
            crate::dto::chat::ReactionRequest,
            crate::dto::chat::PrunedResponse,
            crate::dto::snapshot::RoomSnapshot,
            crate::dto::snapshot::PlayerView,
            crate::dto::snapshot::CardView,
            crate::dto::snapshot::ClueView,
            crate::dto::snapshot::MessageView,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::MessagesRemovedEvent,
            crate::dto::sse::RoomDeletedEvent,
            crate::dao::models::Team,
            crate::dao::models::Role,
            crate::dao::models::CardKind,
            crate::dao::models::Visibility,
            crate::dao::models::MessageKind,
            crate::dao::models::RoomStatus,
            crate::state::phase::RoomPhase,
            crate::state::phase::PauseReason,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "lobby", description = "Public room discovery"),
        (name = "rooms", description = "Room lifecycle and settings"),
        (name = "game", description = "Game lifecycle and turn engine"),
        (name = "chat", description = "Room chat and reactions"),
        (name = "sse", description = "Server-sent event streams"),
    )
)]
pub struct ApiDoc;
