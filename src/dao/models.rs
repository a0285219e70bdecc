use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Normalized room join code (trimmed and uppercased) used as the primary key
/// for rooms, their message logs, and their discovery index entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalize a raw client-supplied code. Format validation happens at the
    /// DTO boundary; the store only ever sees normalized codes.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    /// Borrow the normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the two playing teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    /// The team playing against this one.
    pub fn opposing(self) -> Self {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }

    /// Capitalized name for chat announcements.
    pub fn label(self) -> &'static str {
        match self {
            Team::Red => "Red",
            Team::Blue => "Blue",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Red => f.write_str("red"),
            Team::Blue => f.write_str("blue"),
        }
    }
}

/// Role a player holds within their team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Gives one clue per turn; exactly one per team.
    ClueGiver,
    /// Votes on and confirms card reveals.
    Guesser,
}

/// Hidden affiliation of a board card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum CardKind {
    Red,
    Blue,
    Neutral,
    /// Revealing this card immediately ends the game for the revealing team.
    Trap,
}

impl CardKind {
    /// The team this card scores for, if any.
    pub fn team(self) -> Option<Team> {
        match self {
            CardKind::Red => Some(Team::Red),
            CardKind::Blue => Some(Team::Blue),
            CardKind::Neutral | CardKind::Trap => None,
        }
    }

    /// The card kind scoring for the given team.
    pub fn for_team(team: Team) -> Self {
        match team {
            Team::Red => CardKind::Red,
            Team::Blue => CardKind::Blue,
        }
    }
}

/// Whether a room is listed in the public discovery index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    /// True for publicly discoverable rooms.
    pub fn is_public(self) -> bool {
        matches!(self, Visibility::Public)
    }
}

/// Category of a chat log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    /// Free-form player chat.
    Chat,
    /// A clue announcement, tagged with the giving team.
    Clue,
    /// A card reveal announcement, tagged with the revealed affiliation.
    Reveal,
    /// Room-level announcement (joins, kicks, owner changes). Survives restarts.
    System,
    /// Game-level announcement (start, pause, win). Wiped on start and rematch.
    GameSystem,
}

/// One entry of a room's append-only message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDoc {
    /// Primary key of the message.
    pub id: Uuid,
    /// Author, absent for system-generated entries.
    pub player_id: Option<Uuid>,
    /// Author display name captured at send time.
    pub player_name: Option<String>,
    /// Author avatar captured at send time.
    pub avatar: Option<String>,
    /// Message text (for clue entries, the clue word and count).
    pub body: String,
    /// Entry category, used for display and restart wiping.
    pub kind: MessageKind,
    /// Giving team for clue entries.
    pub clue_team: Option<Team>,
    /// Revealed affiliation for reveal entries.
    pub revealed_kind: Option<CardKind>,
    /// Emoji reactions: emoji to the set of reacting player ids.
    pub reactions: BTreeMap<String, BTreeSet<Uuid>>,
    /// Send timestamp in epoch milliseconds of the store clock.
    pub sent_at: u64,
}

/// Coarse lifecycle status shown in the public room list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum RoomStatus {
    Lobby,
    Active,
    Paused,
    GameOver,
}

/// Denormalized discovery index entry for one public, unlocked room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PublicRoomEntry {
    /// Join code of the listed room.
    pub code: RoomCode,
    /// Room display name.
    pub name: String,
    /// Display name of the current owner.
    pub owner_name: String,
    /// Number of currently connected players.
    pub connected_players: usize,
    /// Maximum number of players admitted.
    pub capacity: usize,
    /// Coarse lifecycle status.
    pub status: RoomStatus,
    /// Turn timer preset in seconds, 0 when disabled.
    pub timer_secs: u32,
    /// Room creation timestamp in epoch milliseconds.
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_code_normalizes_case_and_whitespace() {
        assert_eq!(RoomCode::new("  t1 ").as_str(), "T1");
        assert_eq!(RoomCode::new("AbC-9"), RoomCode::new("abc-9"));
    }

    #[test]
    fn opposing_team_flips() {
        assert_eq!(Team::Red.opposing(), Team::Blue);
        assert_eq!(Team::Blue.opposing(), Team::Red);
    }

    #[test]
    fn card_kind_team_mapping() {
        assert_eq!(CardKind::Red.team(), Some(Team::Red));
        assert_eq!(CardKind::Trap.team(), None);
        assert_eq!(CardKind::Neutral.team(), None);
        assert_eq!(CardKind::for_team(Team::Blue), CardKind::Blue);
    }
}
