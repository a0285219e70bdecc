//! Game lifecycle: starting, pausing, resuming, rematching, and tearing a
//! game down, plus the auto-pause rule every turn transition consults.

use rand::{Rng, rng};
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{RoomCode, Team},
    error::GameError,
    services::{TxDecision, chat_service, lobby_service, mutate_room, turn_service},
    state::{
        SharedState,
        phase::{PauseReason, PhaseEvent},
        room::{BoardCard, Room},
    },
    words::{BoardError, WordCatalog},
};

/// Decide whether the given team can play right now.
///
/// Checked in a fixed order: a fully absent team, then a missing clue-giver
/// while no clue is pending, then a clue with nobody left to guess. This is
/// the single rule behind every automatic pause.
pub fn check_pause(room: &Room, team: Team) -> Option<PauseReason> {
    if !room.team_has_connected_member(team) {
        return Some(PauseReason::TeamDisconnected);
    }

    let clue_active = room.clue.is_some();
    if !clue_active && !room.clue_giver_connected(team) {
        return Some(PauseReason::ClueGiverDisconnected);
    }
    if clue_active && room.connected_guessers_of(team) == 0 {
        return Some(PauseReason::NoGuessers);
    }

    None
}

/// Start a game from the lobby on the room's configured starting team.
pub async fn start_game(
    state: &SharedState,
    code: &RoomCode,
    player_id: &Uuid,
) -> Result<Room, GameError> {
    launch(state, code, player_id, PhaseEvent::Start).await
}

/// Restart a finished game on a fresh board, with a re-drawn starting team.
pub async fn rematch(
    state: &SharedState,
    code: &RoomCode,
    player_id: &Uuid,
) -> Result<Room, GameError> {
    launch(state, code, player_id, PhaseEvent::Rematch).await
}

/// Shared start/rematch algorithm. The phase event decides which source
/// state is legal; everything else is identical.
async fn launch(
    state: &SharedState,
    code: &RoomCode,
    player_id: &Uuid,
    event: PhaseEvent,
) -> Result<Room, GameError> {
    let store = state.require_store().await?;
    let now = store.now_ms();

    let (_, room) = mutate_room(&store, code, |room| {
        room.require_owner(player_id)?;
        room.phase = room.phase.apply(event)?;

        if room.players.len() < 4 {
            return Err(GameError::InvalidState(
                "at least 4 players are needed to start".to_string(),
            ));
        }
        require_team_ready(room, Team::Red)?;
        require_team_ready(room, Team::Blue)?;

        let starting_team = match event {
            PhaseEvent::Rematch => draw_starting_team(&mut rng()),
            _ => room.starting_team,
        };
        room.board = generate_board(state.words(), room, starting_team)?;
        room.starting_team = starting_team;
        room.current_team = starting_team;
        room.clear_clue();
        room.first_clues = Default::default();
        room.turn_started_at = Some(now);

        Ok(TxDecision::Commit(()))
    })
    .await?;

    // Entries from the previous game would otherwise leak into this one.
    chat_service::wipe_game_messages(&store, code).await?;
    chat_service::post_game_system(
        &store,
        code,
        format!("Game started, {} team goes first", room.current_team.label()),
    )
    .await;
    lobby_service::sync_index(&store, &room).await;

    let room = apply_pause_fallout(state, code, room).await?;
    info!(code = %code, starting = %room.current_team.label(), "game started");
    Ok(room)
}

/// Suspend active play at the owner's request.
pub async fn pause_game(
    state: &SharedState,
    code: &RoomCode,
    player_id: &Uuid,
) -> Result<Room, GameError> {
    let store = state.require_store().await?;

    let (_, room) = mutate_room(&store, code, |room| {
        room.require_owner(player_id)?;
        let team = room.current_team;
        room.phase = room
            .phase
            .apply(PhaseEvent::Pause(PauseReason::OwnerPaused, team))?;
        room.turn_started_at = None;
        Ok(TxDecision::Commit(()))
    })
    .await?;

    state.timers().disarm_turn_timer(code);
    chat_service::post_game_system(&store, code, "Game paused by the owner").await;
    lobby_service::sync_index(&store, &room).await;
    Ok(room)
}

/// Resume suspended play. The frozen team must have a connected clue-giver
/// and a connected guesser again; the turn timer restarts from the top.
pub async fn resume_game(
    state: &SharedState,
    code: &RoomCode,
    player_id: &Uuid,
) -> Result<Room, GameError> {
    let store = state.require_store().await?;
    let now = store.now_ms();

    let (_, room) = mutate_room(&store, code, |room| {
        room.require_owner(player_id)?;
        let Some((_, team)) = room.phase.pause() else {
            return Err(GameError::InvalidState(
                "the game is not paused".to_string(),
            ));
        };
        if !room.clue_giver_connected(team) {
            return Err(GameError::InvalidState(format!(
                "the {} team has no connected clue-giver",
                team.label()
            )));
        }
        if room.connected_guessers_of(team) == 0 {
            return Err(GameError::InvalidState(format!(
                "the {} team has no connected guesser",
                team.label()
            )));
        }

        room.phase = room.phase.apply(PhaseEvent::Resume)?;
        room.turn_started_at = Some(now);
        Ok(TxDecision::Commit(()))
    })
    .await?;

    turn_service::arm_turn_expiry(state, code, &room);
    chat_service::post_game_system(&store, code, "Game resumed").await;
    lobby_service::sync_index(&store, &room).await;
    Ok(room)
}

/// Tear the game down and return everyone to the lobby, un-teamed.
pub async fn end_game(
    state: &SharedState,
    code: &RoomCode,
    player_id: &Uuid,
) -> Result<Room, GameError> {
    let store = state.require_store().await?;

    let (_, room) = mutate_room(&store, code, |room| {
        room.require_owner(player_id)?;
        room.phase = room.phase.apply(PhaseEvent::Reset)?;

        room.board.clear();
        room.clear_clue();
        room.first_clues = Default::default();
        room.turn_started_at = None;
        room.current_team = room.starting_team;
        let ids: Vec<Uuid> = room.players.keys().copied().collect();
        for id in ids {
            room.demote(&id);
        }
        Ok(TxDecision::Commit(()))
    })
    .await?;

    state.timers().disarm_turn_timer(code);
    chat_service::post_system(&store, code, "The owner ended the game").await;
    lobby_service::sync_index(&store, &room).await;
    info!(code = %code, "game ended by owner");
    Ok(room)
}

/// Evaluate auto-pause for the team whose turn it now is and persist the
/// outcome: freeze the timer under a pause, arm it otherwise.
pub async fn apply_pause_fallout(
    state: &SharedState,
    code: &RoomCode,
    room: Room,
) -> Result<Room, GameError> {
    if !room.phase.is_active() {
        return Ok(room);
    }

    let Some(reason) = check_pause(&room, room.current_team) else {
        turn_service::arm_turn_expiry(state, code, &room);
        return Ok(room);
    };

    let store = state.require_store().await?;
    let team = room.current_team;
    let (_, paused) = mutate_room(&store, code, |room| {
        if !room.phase.is_active() {
            return Ok(TxDecision::Skip(()));
        }
        room.phase = room.phase.apply(PhaseEvent::Pause(reason, team))?;
        room.turn_started_at = None;
        Ok(TxDecision::Commit(()))
    })
    .await?;

    state.timers().disarm_turn_timer(code);
    chat_service::post_game_system(&store, code, pause_notice(reason, team)).await;
    lobby_service::sync_index(&store, &paused).await;
    info!(code = %code, team = %team.label(), reason = ?reason, "game auto-paused");
    Ok(paused)
}

pub(crate) fn pause_notice(reason: PauseReason, team: Team) -> String {
    let team = team.label();
    match reason {
        PauseReason::OwnerPaused => "Game paused by the owner".to_string(),
        PauseReason::TeamDisconnected => {
            format!("Game paused, the {team} team is disconnected")
        }
        PauseReason::ClueGiverDisconnected => {
            format!("Game paused, the {team} clue-giver is disconnected")
        }
        PauseReason::NoGuessers => {
            format!("Game paused, the {team} team has no guesser left")
        }
    }
}

fn require_team_ready(room: &Room, team: Team) -> Result<(), GameError> {
    if room.clue_giver_of(team).is_none() {
        return Err(GameError::InvalidState(format!(
            "the {} team needs a clue-giver",
            team.label()
        )));
    }
    if room.guessers_of(team) == 0 {
        return Err(GameError::InvalidState(format!(
            "the {} team needs at least one guesser",
            team.label()
        )));
    }
    Ok(())
}

fn draw_starting_team(rng: &mut impl Rng) -> Team {
    if rng.random_bool(0.5) {
        Team::Red
    } else {
        Team::Blue
    }
}

fn generate_board(
    words: &WordCatalog,
    room: &Room,
    starting_team: Team,
) -> Result<Vec<BoardCard>, GameError> {
    words
        .generate_board(&room.word_packs, &room.custom_words, starting_team)
        .map_err(|err| match err {
            BoardError::UnknownPack(id) => {
                GameError::InvalidInput(format!("unknown word pack `{id}`"))
            }
            BoardError::NotEnoughWords { have, need } => GameError::InvalidInput(format!(
                "not enough words to fill the board: have {have}, need {need}"
            )),
        })
}
