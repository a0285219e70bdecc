use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::dao::models::{RoomStatus, Team};

/// Why a running game is currently suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum PauseReason {
    /// The owner paused play manually.
    OwnerPaused,
    /// No member of the team whose turn it is remains connected.
    TeamDisconnected,
    /// The team's clue-giver is disconnected and no clue is pending.
    ClueGiverDisconnected,
    /// A clue is pending but the team has no connected guesser.
    NoGuessers,
}

/// Lifecycle phase of a room. Exactly one of these holds at any time; the
/// paused and finished variants carry the data that qualifies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RoomPhase {
    /// No game is running; teams, word packs, and settings can be managed.
    Lobby,
    /// A game is in progress and the current team may act.
    Active,
    /// A game is in progress but suspended. `team` is the team whose turn it
    /// is, which is always the team the pause was evaluated for.
    Paused {
        /// Why play is suspended.
        reason: PauseReason,
        /// Team whose turn is frozen.
        team: Team,
    },
    /// The game ended; board stays visible until rematch or reset.
    GameOver {
        /// Team that won.
        winner: Team,
    },
}

/// Events that can be applied to a room's lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Owner starts the game from the lobby.
    Start,
    /// Play is suspended, manually or automatically.
    Pause(PauseReason, Team),
    /// Owner resumes suspended play.
    Resume,
    /// A reveal ended the game.
    Finish(Team),
    /// Owner restarts on a fresh board with the same rosters.
    Rematch,
    /// Owner tears the game down and returns everyone to the lobby.
    Reset,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the room was in when the invalid event was received.
    pub from: RoomPhase,
    /// The event that cannot be applied from this phase.
    pub event: PhaseEvent,
}

impl RoomPhase {
    /// Compute the next phase for an event, rejecting transitions the
    /// lifecycle diagram does not allow.
    pub fn apply(&self, event: PhaseEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = match (*self, event) {
            (RoomPhase::Lobby, PhaseEvent::Start) => RoomPhase::Active,
            (RoomPhase::Active, PhaseEvent::Pause(reason, team)) => {
                RoomPhase::Paused { reason, team }
            }
            (RoomPhase::Paused { .. }, PhaseEvent::Resume) => RoomPhase::Active,
            (RoomPhase::Active, PhaseEvent::Finish(winner)) => RoomPhase::GameOver { winner },
            (RoomPhase::GameOver { .. }, PhaseEvent::Rematch) => RoomPhase::Active,
            (
                RoomPhase::Active | RoomPhase::Paused { .. } | RoomPhase::GameOver { .. },
                PhaseEvent::Reset,
            ) => RoomPhase::Lobby,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }

    /// True once a game exists (anything but the lobby).
    pub fn is_started(&self) -> bool {
        !matches!(self, RoomPhase::Lobby)
    }

    /// True while the current team may act (started, not paused, not over).
    pub fn is_active(&self) -> bool {
        matches!(self, RoomPhase::Active)
    }

    /// The pause qualifier, if suspended.
    pub fn pause(&self) -> Option<(PauseReason, Team)> {
        match self {
            RoomPhase::Paused { reason, team } => Some((*reason, *team)),
            _ => None,
        }
    }

    /// The winning team, if the game is over.
    pub fn winner(&self) -> Option<Team> {
        match self {
            RoomPhase::GameOver { winner } => Some(*winner),
            _ => None,
        }
    }

    /// Coarse status shown in the discovery index.
    pub fn status(&self) -> RoomStatus {
        match self {
            RoomPhase::Lobby => RoomStatus::Lobby,
            RoomPhase::Active => RoomStatus::Active,
            RoomPhase::Paused { .. } => RoomStatus::Paused,
            RoomPhase::GameOver { .. } => RoomStatus::GameOver,
        }
    }
}
