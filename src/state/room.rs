use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{CardKind, Role, RoomCode, Team, Visibility};
use crate::error::GameError;
use crate::state::phase::RoomPhase;

/// Number of cards on a generated board.
pub const BOARD_SIZE: usize = 25;

/// Player record tracked inside a room document. Created on first join and
/// removed only by a kick; ordinary disconnects merely flip `connected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Display name, unique among connected players (case-insensitive).
    pub name: String,
    /// Emoji or image URL chosen by the player.
    pub avatar: Option<String>,
    /// Team membership, `None` for spectators.
    pub team: Option<Team>,
    /// Role within the team; only set when a team is set.
    pub role: Option<Role>,
    /// Liveness as derived from the heartbeat table. Always written
    /// explicitly, never inferred from absence.
    pub connected: bool,
    /// Last time this player was seen, epoch milliseconds of the store clock.
    pub last_seen: u64,
}

impl Player {
    /// Build a freshly joined spectator.
    pub fn new(name: String, avatar: Option<String>, now: u64) -> Self {
        Self {
            name,
            avatar,
            team: None,
            role: None,
            connected: true,
            last_seen: now,
        }
    }
}

/// One cell of the 25-card board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardCard {
    /// The word printed on the card.
    pub word: String,
    /// Hidden affiliation.
    pub kind: CardKind,
    /// Whether the card has been revealed. Transitions `false -> true`
    /// exactly once and never back.
    pub revealed: bool,
    /// Player who confirmed the reveal.
    pub revealed_by: Option<Uuid>,
    /// Current guesser votes on this card.
    pub votes: BTreeSet<Uuid>,
}

impl BoardCard {
    /// Build an unrevealed card.
    pub fn new(word: String, kind: CardKind) -> Self {
        Self {
            word,
            kind,
            revealed: false,
            revealed_by: None,
            votes: BTreeSet::new(),
        }
    }
}

/// The clue currently in play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clue {
    /// Normalized clue word.
    pub word: String,
    /// Number of cards the clue is meant to relate to.
    pub count: u8,
}

/// Per-team flags recording whether the team's first clue of this game has
/// been given yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstClueFlags {
    /// Red team has given its first clue.
    pub red: bool,
    /// Blue team has given its first clue.
    pub blue: bool,
}

impl FirstClueFlags {
    /// Whether the team's first clue has been given.
    pub fn given(&self, team: Team) -> bool {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
        }
    }

    /// Record that the team has given its first clue.
    pub fn mark(&mut self, team: Team) {
        match team {
            Team::Red => self.red = true,
            Team::Blue => self.blue = true,
        }
    }
}

/// Aggregate room document: the single unit of atomic persistence. Every
/// mutation loads one of these, runs a validating method or closure, and
/// writes it back through a revisioned swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Normalized join code, also the storage key.
    pub code: RoomCode,
    /// Display name shown in the lobby and discovery list.
    pub name: String,
    /// Player currently holding owner privileges.
    pub owner_id: Uuid,
    /// Whether the room is listed in the public index.
    pub visibility: Visibility,
    /// Locked rooms reject new players; existing players may always rejoin.
    pub locked: bool,
    /// Maximum number of player records admitted.
    pub capacity: usize,
    /// Lifecycle phase.
    pub phase: RoomPhase,
    /// Team whose turn it is (meaningful once started).
    pub current_team: Team,
    /// Team that opens the game; re-randomized on rematch.
    pub starting_team: Team,
    /// Word pack ids used to build boards.
    pub word_packs: Vec<String>,
    /// Owner-supplied extra words mixed into the pool.
    pub custom_words: Vec<String>,
    /// Turn timer preset in seconds, 0 disables the timer.
    pub timer_secs: u32,
    /// The 25-card board; empty while in the lobby.
    pub board: Vec<BoardCard>,
    /// Clue currently in play.
    pub clue: Option<Clue>,
    /// Guesses left for the current clue (`count + 1` when given).
    pub guesses_left: Option<u8>,
    /// Turn timer anchor, epoch milliseconds; `None` while frozen.
    pub turn_started_at: Option<u64>,
    /// Per-team first-clue bookkeeping.
    pub first_clues: FirstClueFlags,
    /// Players keyed by id, in join order.
    pub players: IndexMap<Uuid, Player>,
    /// Temporary bans: player id to expiry in epoch milliseconds.
    pub bans: BTreeMap<Uuid, u64>,
    /// Creation timestamp in epoch milliseconds.
    pub created_at: u64,
}

impl Room {
    /// Build an empty lobby-phase room.
    pub fn new(
        code: RoomCode,
        name: String,
        owner_id: Uuid,
        visibility: Visibility,
        capacity: usize,
        starting_team: Team,
        now: u64,
    ) -> Self {
        Self {
            code,
            name,
            owner_id,
            visibility,
            locked: false,
            capacity,
            phase: RoomPhase::Lobby,
            current_team: starting_team,
            starting_team,
            word_packs: Vec::new(),
            custom_words: Vec::new(),
            timer_secs: 0,
            board: Vec::new(),
            clue: None,
            guesses_left: None,
            turn_started_at: None,
            first_clues: FirstClueFlags::default(),
            players: IndexMap::new(),
            bans: BTreeMap::new(),
            created_at: now,
        }
    }

    /// Look up a player record.
    pub fn player(&self, id: &Uuid) -> Option<&Player> {
        self.players.get(id)
    }

    /// Look up a player record mutably.
    pub fn player_mut(&mut self, id: &Uuid) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Look up a player record or fail with a not-found error.
    pub fn require_player(&self, id: &Uuid) -> Result<&Player, GameError> {
        self.players
            .get(id)
            .ok_or_else(|| GameError::NotFound(format!("player {id} in room {}", self.code)))
    }

    /// Fail unless the acting player currently owns the room.
    pub fn require_owner(&self, id: &Uuid) -> Result<(), GameError> {
        self.require_player(id)?;
        if self.owner_id != *id {
            return Err(GameError::NotOwner);
        }
        Ok(())
    }

    /// Number of players currently marked connected.
    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    /// Whether a connected player other than `exclude` already uses `name`
    /// (case-insensitive).
    pub fn connected_name_taken(&self, name: &str, exclude: &Uuid) -> bool {
        self.players
            .iter()
            .any(|(id, p)| id != exclude && p.connected && p.name.eq_ignore_ascii_case(name))
    }

    /// Connected player with the smallest id, the owner-succession candidate.
    /// Id order keeps the pick stable regardless of join order.
    pub fn first_connected_player(&self) -> Option<Uuid> {
        self.players
            .iter()
            .filter(|(_, p)| p.connected)
            .map(|(id, _)| *id)
            .min()
    }

    /// The team's clue-giver, connected or not.
    pub fn clue_giver_of(&self, team: Team) -> Option<Uuid> {
        self.players
            .iter()
            .find(|(_, p)| p.team == Some(team) && p.role == Some(Role::ClueGiver))
            .map(|(id, _)| *id)
    }

    /// Whether the team's clue-giver exists and is connected.
    pub fn clue_giver_connected(&self, team: Team) -> bool {
        self.players
            .values()
            .any(|p| p.team == Some(team) && p.role == Some(Role::ClueGiver) && p.connected)
    }

    /// Number of connected guessers on the team; sets the vote quorum.
    pub fn connected_guessers_of(&self, team: Team) -> usize {
        self.players
            .values()
            .filter(|p| p.team == Some(team) && p.role == Some(Role::Guesser) && p.connected)
            .count()
    }

    /// Number of guessers on the team, connected or not.
    pub fn guessers_of(&self, team: Team) -> usize {
        self.players
            .values()
            .filter(|p| p.team == Some(team) && p.role == Some(Role::Guesser))
            .count()
    }

    /// Whether any member of the team is connected.
    pub fn team_has_connected_member(&self, team: Team) -> bool {
        self.players
            .values()
            .any(|p| p.team == Some(team) && p.connected)
    }

    /// Assign or clear a player's team and role. Enforces that a role implies
    /// a team and that each team has at most one clue-giver.
    pub fn assign_role(
        &mut self,
        id: &Uuid,
        team: Option<Team>,
        role: Option<Role>,
    ) -> Result<(), GameError> {
        if role.is_some() && team.is_none() {
            return Err(GameError::InvalidInput(
                "a role requires a team".to_string(),
            ));
        }

        if let (Some(team), Some(Role::ClueGiver)) = (team, role) {
            match self.clue_giver_of(team) {
                Some(existing) if existing != *id => {
                    return Err(GameError::InvalidState(format!(
                        "the {team} team already has a clue-giver"
                    )));
                }
                _ => {}
            }
        }

        let player = self
            .players
            .get_mut(id)
            .ok_or_else(|| GameError::NotFound(format!("player {id} in room {}", self.code)))?;
        player.team = team;
        player.role = role;
        Ok(())
    }

    /// Clear a player's team and role, returning them to spectating.
    pub fn demote(&mut self, id: &Uuid) {
        if let Some(player) = self.players.get_mut(id) {
            player.team = None;
            player.role = None;
        }
    }

    /// Borrow a board card, rejecting out-of-range indices.
    pub fn card(&self, index: usize) -> Result<&BoardCard, GameError> {
        self.board
            .get(index)
            .ok_or_else(|| GameError::InvalidInput(format!("card index {index} out of range")))
    }

    /// Toggle a player's vote on an unrevealed card. Returns whether the vote
    /// is present after the toggle.
    pub fn toggle_vote(&mut self, index: usize, player_id: Uuid) -> Result<bool, GameError> {
        let card = self
            .board
            .get_mut(index)
            .ok_or_else(|| GameError::InvalidInput(format!("card index {index} out of range")))?;
        if card.revealed {
            return Err(GameError::AlreadyRevealed);
        }

        if card.votes.remove(&player_id) {
            Ok(false)
        } else {
            card.votes.insert(player_id);
            Ok(true)
        }
    }

    /// Claim the reveal of a card. The flag only ever goes `false -> true`;
    /// a second claim observes `revealed` and fails.
    pub fn reveal_card(&mut self, index: usize, by: Uuid) -> Result<CardKind, GameError> {
        let card = self
            .board
            .get_mut(index)
            .ok_or_else(|| GameError::InvalidInput(format!("card index {index} out of range")))?;
        if card.revealed {
            return Err(GameError::AlreadyRevealed);
        }

        card.revealed = true;
        card.revealed_by = Some(by);
        card.votes.clear();
        Ok(card.kind)
    }

    /// Clear the votes of every unrevealed card.
    pub fn clear_votes(&mut self) {
        for card in self.board.iter_mut().filter(|c| !c.revealed) {
            card.votes.clear();
        }
    }

    /// Remove one player's vote from every card.
    pub fn strip_votes_of(&mut self, player_id: &Uuid) {
        for card in &mut self.board {
            card.votes.remove(player_id);
        }
    }

    /// Unrevealed cards of the given affiliation still on the board.
    pub fn unrevealed_of(&self, kind: CardKind) -> usize {
        self.board
            .iter()
            .filter(|c| c.kind == kind && !c.revealed)
            .count()
    }

    /// Decrement the remaining guess budget, never below zero. Returns the
    /// budget left after the decrement.
    pub fn consume_guess(&mut self) -> u8 {
        let left = self.guesses_left.unwrap_or(0).saturating_sub(1);
        self.guesses_left = Some(left);
        left
    }

    /// Drop the clue and its guess budget.
    pub fn clear_clue(&mut self) {
        self.clue = None;
        self.guesses_left = None;
    }

    /// Milliseconds left on the player's ban, if one is in force.
    pub fn ban_remaining(&self, id: &Uuid, now: u64) -> Option<u64> {
        self.bans
            .get(id)
            .and_then(|expiry| expiry.checked_sub(now))
            .filter(|remaining| *remaining > 0)
    }

    /// Drop bans whose expiry has passed. Returns whether anything changed.
    pub fn purge_expired_bans(&mut self, now: u64) -> bool {
        let before = self.bans.len();
        self.bans.retain(|_, expiry| *expiry > now);
        self.bans.len() != before
    }

    /// Absolute turn deadline, when a timer is configured and running.
    pub fn turn_deadline(&self) -> Option<u64> {
        if self.timer_secs == 0 || !self.phase.is_active() {
            return None;
        }
        self.turn_started_at
            .map(|started| started + u64::from(self.timer_secs) * 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::Visibility;

    fn room() -> Room {
        Room::new(
            RoomCode::new("T1"),
            "Test room".to_string(),
            Uuid::new_v4(),
            Visibility::Private,
            12,
            Team::Red,
            1_000,
        )
    }

    fn add_player(room: &mut Room, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        room.players
            .insert(id, Player::new(name.to_string(), None, 1_000));
        id
    }

    #[test]
    fn second_clue_giver_on_same_team_rejected() {
        let mut room = room();
        let a = add_player(&mut room, "A");
        let b = add_player(&mut room, "B");

        room.assign_role(&a, Some(Team::Red), Some(Role::ClueGiver))
            .unwrap();
        let err = room
            .assign_role(&b, Some(Team::Red), Some(Role::ClueGiver))
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));

        // The other team and re-assigning the same player are both fine.
        room.assign_role(&b, Some(Team::Blue), Some(Role::ClueGiver))
            .unwrap();
        room.assign_role(&a, Some(Team::Red), Some(Role::ClueGiver))
            .unwrap();
    }

    #[test]
    fn disconnected_clue_giver_still_blocks_the_seat() {
        let mut room = room();
        let a = add_player(&mut room, "A");
        let b = add_player(&mut room, "B");
        room.assign_role(&a, Some(Team::Red), Some(Role::ClueGiver))
            .unwrap();
        room.player_mut(&a).unwrap().connected = false;

        let err = room
            .assign_role(&b, Some(Team::Red), Some(Role::ClueGiver))
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
    }

    #[test]
    fn role_without_team_rejected() {
        let mut room = room();
        let a = add_player(&mut room, "A");
        let err = room.assign_role(&a, None, Some(Role::Guesser)).unwrap_err();
        assert!(matches!(err, GameError::InvalidInput(_)));
    }

    #[test]
    fn reveal_claims_exactly_once() {
        let mut room = room();
        let a = add_player(&mut room, "A");
        let b = add_player(&mut room, "B");
        room.board
            .push(BoardCard::new("OTTER".to_string(), CardKind::Red));

        assert_eq!(room.reveal_card(0, a).unwrap(), CardKind::Red);
        let err = room.reveal_card(0, b).unwrap_err();
        assert!(matches!(err, GameError::AlreadyRevealed));
        assert_eq!(room.board[0].revealed_by, Some(a));
    }

    #[test]
    fn vote_toggles_and_rejects_revealed_cards() {
        let mut room = room();
        let a = add_player(&mut room, "A");
        room.board
            .push(BoardCard::new("CANAL".to_string(), CardKind::Neutral));

        assert!(room.toggle_vote(0, a).unwrap());
        assert!(!room.toggle_vote(0, a).unwrap());
        assert!(room.board[0].votes.is_empty());

        room.reveal_card(0, a).unwrap();
        assert!(matches!(
            room.toggle_vote(0, a),
            Err(GameError::AlreadyRevealed)
        ));
    }

    #[test]
    fn guess_budget_never_goes_negative() {
        let mut room = room();
        room.guesses_left = Some(1);
        assert_eq!(room.consume_guess(), 0);
        assert_eq!(room.consume_guess(), 0);
        assert_eq!(room.guesses_left, Some(0));
    }

    #[test]
    fn ban_expiry_is_exclusive() {
        let mut room = room();
        let a = Uuid::new_v4();
        room.bans.insert(a, 5_000);

        assert_eq!(room.ban_remaining(&a, 4_000), Some(1_000));
        assert_eq!(room.ban_remaining(&a, 5_000), None);
        assert!(room.purge_expired_bans(5_000));
        assert!(room.bans.is_empty());
    }

    #[test]
    fn succession_prefers_smallest_connected_id() {
        let mut room = room();
        let a = add_player(&mut room, "A");
        let b = add_player(&mut room, "B");
        let c = add_player(&mut room, "C");

        let mut connected = vec![b, c];
        connected.sort();

        room.player_mut(&a).unwrap().connected = false;
        assert_eq!(room.first_connected_player(), Some(connected[0]));

        room.player_mut(&connected[0]).unwrap().connected = false;
        assert_eq!(room.first_connected_player(), Some(connected[1]));
    }

    #[test]
    fn name_collision_ignores_case_and_disconnected_players() {
        let mut room = room();
        let a = add_player(&mut room, "Ada");
        let b = add_player(&mut room, "Brin");
        let newcomer = Uuid::new_v4();

        assert!(room.connected_name_taken("ADA", &newcomer));
        assert!(!room.connected_name_taken("Ada", &a));

        room.player_mut(&b).unwrap().connected = false;
        assert!(!room.connected_name_taken("brin", &newcomer));
    }

    #[test]
    fn turn_deadline_requires_active_phase_and_timer() {
        let mut room = room();
        room.timer_secs = 120;
        room.turn_started_at = Some(10_000);
        assert_eq!(room.turn_deadline(), None);

        room.phase = RoomPhase::Active;
        assert_eq!(room.turn_deadline(), Some(130_000));

        room.turn_started_at = None;
        assert_eq!(room.turn_deadline(), None);

        room.turn_started_at = Some(10_000);
        room.timer_secs = 0;
        assert_eq!(room.turn_deadline(), None);
    }
}
