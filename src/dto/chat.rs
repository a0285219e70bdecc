use serde::Deserialize;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::validation::{validate_emoji, validate_message_body};

/// Request payload for posting a chat message.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendMessageRequest {
    /// Id of the sending player.
    pub player_id: Uuid,
    /// Message text.
    #[validate(custom(function = validate_message_body))]
    pub body: String,
}

/// Request payload for toggling an emoji reaction on a message.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReactionRequest {
    /// Id of the reacting player.
    pub player_id: Uuid,
    /// The emoji to add or remove.
    #[validate(custom(function = validate_emoji))]
    pub emoji: String,
}

/// Response returned by the owner-triggered chat prune.
#[derive(Debug, Serialize, ToSchema)]
pub struct PrunedResponse {
    /// Number of messages removed from the log.
    pub pruned: usize,
}
