use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{CardKind, MessageDoc, MessageKind, Role, Team, Visibility},
    dto::format_epoch_ms,
    state::{
        phase::RoomPhase,
        room::{BoardCard, Clue, Player, Room},
    },
};

/// One participant as rendered in a room snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerView {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Team membership, absent for spectators.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    /// Seat on the team, absent for spectators.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub connected: bool,
    pub is_owner: bool,
}

/// One board card as rendered in a room snapshot.
///
/// Card identities are served to every client; concealing them from
/// guessers is a rendering concern of the front end.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CardView {
    pub word: String,
    pub kind: CardKind,
    pub revealed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revealed_by: Option<Uuid>,
    /// Ids of the guessers currently voting for this card.
    pub votes: Vec<Uuid>,
}

impl From<&BoardCard> for CardView {
    fn from(card: &BoardCard) -> Self {
        Self {
            word: card.word.clone(),
            kind: card.kind,
            revealed: card.revealed,
            revealed_by: card.revealed_by,
            votes: card.votes.iter().copied().collect(),
        }
    }
}

/// The clue currently in play.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClueView {
    pub word: String,
    pub count: u8,
}

impl From<&Clue> for ClueView {
    fn from(clue: &Clue) -> Self {
        Self {
            word: clue.word.clone(),
            count: clue.count,
        }
    }
}

/// Full room state as served to clients, both over HTTP and as the SSE
/// `snapshot` event.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSnapshot {
    pub code: String,
    pub name: String,
    pub owner_id: Uuid,
    pub visibility: Visibility,
    pub locked: bool,
    pub capacity: usize,
    /// Lifecycle phase with its qualifier (pause reason, winner).
    pub phase: RoomPhase,
    pub current_team: Team,
    pub starting_team: Team,
    pub word_packs: Vec<String>,
    pub custom_words: Vec<String>,
    /// Turn timer in seconds, `0` when the room plays untimed.
    pub timer_secs: u32,
    /// Empty until a game has been started.
    pub board: Vec<CardView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clue: Option<ClueView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guesses_left: Option<u8>,
    /// RFC3339 instant the running turn started at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_started_at: Option<String>,
    /// RFC3339 instant the running turn expires at, absent when untimed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_ends_at: Option<String>,
    pub players: Vec<PlayerView>,
    pub created_at: String,
}

impl From<&Room> for RoomSnapshot {
    fn from(room: &Room) -> Self {
        let players = room
            .players
            .iter()
            .map(|(id, player)| player_view(*id, player, room.owner_id))
            .collect();

        Self {
            code: room.code.as_str().to_string(),
            name: room.name.clone(),
            owner_id: room.owner_id,
            visibility: room.visibility,
            locked: room.locked,
            capacity: room.capacity,
            phase: room.phase,
            current_team: room.current_team,
            starting_team: room.starting_team,
            word_packs: room.word_packs.clone(),
            custom_words: room.custom_words.clone(),
            timer_secs: room.timer_secs,
            board: room.board.iter().map(Into::into).collect(),
            clue: room.clue.as_ref().map(Into::into),
            guesses_left: room.guesses_left,
            turn_started_at: room.turn_started_at.map(format_epoch_ms),
            turn_ends_at: room.turn_deadline().map(format_epoch_ms),
            players,
            created_at: format_epoch_ms(room.created_at),
        }
    }
}

impl From<Room> for RoomSnapshot {
    fn from(room: Room) -> Self {
        Self::from(&room)
    }
}

fn player_view(id: Uuid, player: &Player, owner_id: Uuid) -> PlayerView {
    PlayerView {
        id,
        name: player.name.clone(),
        avatar: player.avatar.clone(),
        team: player.team,
        role: player.role,
        connected: player.connected,
        is_owner: id == owner_id,
    }
}

/// One chat-log entry as rendered to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageView {
    pub id: Uuid,
    /// Author, absent for system-generated entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub body: String,
    pub kind: MessageKind,
    /// Team the clue belongs to, set on clue entries only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clue_team: Option<Team>,
    /// Identity of the revealed card, set on reveal entries only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revealed_kind: Option<CardKind>,
    /// Emoji reactions keyed by emoji, each listing the reacting players.
    pub reactions: BTreeMap<String, Vec<Uuid>>,
    pub sent_at: String,
}

impl From<MessageDoc> for MessageView {
    fn from(doc: MessageDoc) -> Self {
        Self {
            id: doc.id,
            player_id: doc.player_id,
            player_name: doc.player_name,
            avatar: doc.avatar,
            body: doc.body,
            kind: doc.kind,
            clue_team: doc.clue_team,
            revealed_kind: doc.revealed_kind,
            reactions: doc
                .reactions
                .into_iter()
                .map(|(emoji, voters)| (emoji, voters.into_iter().collect()))
                .collect(),
            sent_at: format_epoch_ms(doc.sent_at),
        }
    }
}
