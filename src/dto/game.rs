//! Request and response payloads for gameplay endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{CardKind, Role, Team},
    dto::validation::validate_clue_word,
};

/// Payload assigning or clearing a team and role.
///
/// `target_id` defaults to the acting player; the owner may name another
/// player.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRoleRequest {
    pub player_id: Uuid,
    #[serde(default)]
    pub target_id: Option<Uuid>,
    #[serde(default)]
    pub team: Option<Team>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Payload submitting a clue for the current team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GiveClueRequest {
    pub player_id: Uuid,
    #[validate(custom(function = validate_clue_word))]
    pub word: String,
    /// Number of board cards the clue relates to.
    #[validate(range(min = 1, max = 9))]
    pub count: u8,
}

/// Payload acting on one board card by index.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CardActionRequest {
    pub player_id: Uuid,
    /// Zero-based board index.
    pub card: usize,
}

/// Result of a vote toggle.
#[derive(Debug, Serialize, ToSchema)]
pub struct VoteResponse {
    /// Whether the caller's vote is present after the toggle.
    pub voted: bool,
}

/// Result of a confirmed reveal.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevealResponse {
    /// True affiliation of the revealed card.
    pub kind: CardKind,
    /// Whether this reveal ended the game.
    pub game_over: bool,
    /// Winning team when the game ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Team>,
    /// Whether the turn passed to the other team.
    pub turn_passed: bool,
    /// Guess budget left when the turn continues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guesses_left: Option<u8>,
}
