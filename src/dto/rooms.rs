//! Request and response payloads for room lifecycle endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{PublicRoomEntry, RoomStatus, Visibility},
    dto::{
        format_epoch_ms,
        validation::{
            validate_custom_words, validate_player_name, validate_room_name,
            validate_timer_preset,
        },
    },
};

/// Generic action acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Payload creating a brand-new room with a generated join code.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    /// Identity of the creating player, who becomes the owner.
    pub player_id: Uuid,
    #[validate(custom(function = validate_player_name))]
    pub player_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Room display name; defaults to the creator's name.
    #[serde(default)]
    pub room_name: Option<String>,
    /// Whether the room is listed for discovery. Defaults to private.
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

/// Code and initial state of a freshly created room.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRoomResponse {
    pub code: String,
    pub room: super::snapshot::RoomSnapshot,
}

/// Payload joining an existing room, or creating it when the code is free.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    /// Client-held player identity, stable across reconnects.
    pub player_id: Uuid,
    #[validate(custom(function = validate_player_name))]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Visibility applied only when this join creates the room.
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

/// Payload for operations that carry nothing beyond the acting player.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PlayerActionRequest {
    pub player_id: Uuid,
}

/// Payload toggling the room lock.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetLockedRequest {
    pub player_id: Uuid,
    pub locked: bool,
}

/// Payload renaming the room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetRoomNameRequest {
    pub player_id: Uuid,
    #[validate(custom(function = validate_room_name))]
    pub name: String,
}

/// Payload selecting the turn timer preset.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetTimerRequest {
    pub player_id: Uuid,
    #[validate(custom(function = validate_timer_preset))]
    pub timer_secs: u32,
}

/// Payload selecting the word packs used for board generation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetWordPacksRequest {
    pub player_id: Uuid,
    pub packs: Vec<String>,
}

/// Payload replacing the room's custom word list.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetCustomWordsRequest {
    pub player_id: Uuid,
    #[validate(custom(function = validate_custom_words))]
    pub words: Vec<String>,
}

/// Payload removing a player from the room with a temporary ban.
#[derive(Debug, Deserialize, ToSchema)]
pub struct KickPlayerRequest {
    pub player_id: Uuid,
    pub target_id: Uuid,
}

/// Outcome of an ownership reassignment attempt.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum OwnershipResponse {
    /// The current owner is connected; nothing to do.
    OwnerConnected,
    /// Ownership moved to a new player.
    #[serde(rename_all = "camelCase")]
    Transferred {
        new_owner_id: Uuid,
        new_owner_name: String,
    },
    /// The owner is disconnected but still within the grace period.
    #[serde(rename_all = "camelCase")]
    GracePending { remaining_ms: u64 },
    /// Nobody is connected to take the seat.
    NoCandidate,
}

/// Players demoted to spectators by a stale-player prune.
#[derive(Debug, Serialize, ToSchema)]
pub struct PruneStaleResponse {
    pub demoted: Vec<Uuid>,
}

/// One public room as shown in the lobby browser.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicRoomView {
    pub code: String,
    pub name: String,
    pub owner_name: String,
    pub connected_players: usize,
    pub capacity: usize,
    pub status: RoomStatus,
    pub timer_secs: u32,
    pub created_at: String,
}

impl From<PublicRoomEntry> for PublicRoomView {
    fn from(entry: PublicRoomEntry) -> Self {
        Self {
            code: entry.code.as_str().to_string(),
            name: entry.name,
            owner_name: entry.owner_name,
            connected_players: entry.connected_players,
            capacity: entry.capacity,
            status: entry.status,
            timer_secs: entry.timer_secs,
            created_at: format_epoch_ms(entry.created_at),
        }
    }
}

/// Response listing every discoverable room, also the lobby SSE `rooms`
/// event payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicRoomsResponse {
    pub rooms: Vec<PublicRoomView>,
}
