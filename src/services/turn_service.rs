//! Turn and voting engine: clues, vote toggling, quorum-gated reveals, and
//! turn switching, including the expiry task behind timed turns.

use std::sync::Arc;

use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{CardKind, Role, RoomCode, Team},
    dao::session_store::SessionStore,
    dto::game::{CardActionRequest, GiveClueRequest, RevealResponse, VoteResponse},
    error::GameError,
    services::{TxDecision, chat_service, game_service, lobby_service, mutate_room},
    state::{
        SharedState,
        phase::{PauseReason, PhaseEvent},
        room::{Clue, Room},
    },
    words::normalize_word,
};

/// Votes a card needs before its reveal may be confirmed. Small teams
/// cannot raise two votes, so they get by with one.
pub fn required_votes(connected_guessers: usize) -> usize {
    if connected_guessers <= 3 { 1 } else { 2 }
}

/// Submit a clue for the current team and open its guessing window.
pub async fn give_clue(
    state: &SharedState,
    code: &RoomCode,
    request: GiveClueRequest,
) -> Result<Room, GameError> {
    let store = state.require_store().await?;
    let now = store.now_ms();
    let word = normalize_word(&request.word);

    let (team, room) = mutate_room(&store, code, |room| {
        require_active(room)?;
        let team = room.current_team;
        let player = room.require_player(&request.player_id)?;
        if player.team != Some(team) || player.role != Some(Role::ClueGiver) {
            return Err(GameError::Forbidden(format!(
                "only the {} clue-giver may give a clue",
                team.label()
            )));
        }
        if room.clue.is_some() {
            return Err(GameError::InvalidState(
                "a clue is already active".to_string(),
            ));
        }
        if room.board.iter().any(|card| card.word == word) {
            return Err(GameError::InvalidInput(
                "the clue may not be a word on the board".to_string(),
            ));
        }

        room.clue = Some(Clue {
            word: word.clone(),
            count: request.count,
        });
        room.guesses_left = Some(request.count + 1);
        room.clear_votes();
        room.first_clues.mark(team);
        room.turn_started_at = Some(now);
        Ok(TxDecision::Commit(team))
    })
    .await?;

    chat_service::post_clue(&store, code, team, &word, request.count).await;
    arm_turn_expiry(state, code, &room);
    debug!(code = %code, team = %team.label(), word = %word, "clue given");
    Ok(room)
}

/// Toggle the caller's vote on a card. Votes race freely between guessers,
/// so the toggle rides the compare-and-swap loop untouched.
pub async fn vote_card(
    state: &SharedState,
    code: &RoomCode,
    request: CardActionRequest,
) -> Result<VoteResponse, GameError> {
    let store = state.require_store().await?;

    let (voted, _) = mutate_room(&store, code, |room| {
        require_active(room)?;
        require_guessing(room, &request.player_id)?;
        let voted = room.toggle_vote(request.card, request.player_id)?;
        Ok(TxDecision::Commit(voted))
    })
    .await?;

    Ok(VoteResponse { voted })
}

/// Reveal a card once its vote quorum is met. The caller must be among the
/// voters; the first confirmer wins the claim and later ones observe
/// [`GameError::AlreadyRevealed`].
pub async fn confirm_reveal(
    state: &SharedState,
    code: &RoomCode,
    request: CardActionRequest,
) -> Result<RevealResponse, GameError> {
    let store = state.require_store().await?;
    let now = store.now_ms();

    let (outcome, room) = mutate_room(&store, code, |room| {
        require_active(room)?;
        require_guessing(room, &request.player_id)?;

        let team = room.current_team;
        let card = room.card(request.card)?;
        if card.revealed {
            return Err(GameError::AlreadyRevealed);
        }
        let need = required_votes(room.connected_guessers_of(team));
        let have = card.votes.len();
        if have < need {
            return Err(GameError::InsufficientVotes { have, need });
        }
        if !card.votes.contains(&request.player_id) {
            return Err(GameError::Forbidden(
                "confirming a reveal requires your own vote on the card".to_string(),
            ));
        }

        let kind = room.reveal_card(request.card, request.player_id)?;
        let word = room.card(request.card)?.word.clone();
        let own_kind = CardKind::for_team(team);

        let outcome = if kind == CardKind::Trap {
            finish_game(room, team.opposing())?;
            Outcome {
                word,
                kind,
                winner: Some(team.opposing()),
                turn_passed: false,
                paused: None,
                guesses_left: None,
            }
        } else if kind == own_kind {
            if room.unrevealed_of(own_kind) == 0 {
                finish_game(room, team)?;
                Outcome {
                    word,
                    kind,
                    winner: Some(team),
                    turn_passed: false,
                    paused: None,
                    guesses_left: None,
                }
            } else {
                let left = room.consume_guess();
                if left == 0 {
                    let paused = pass_turn(room, now)?;
                    Outcome {
                        word,
                        kind,
                        winner: None,
                        turn_passed: true,
                        paused,
                        guesses_left: None,
                    }
                } else {
                    Outcome {
                        word,
                        kind,
                        winner: None,
                        turn_passed: false,
                        paused: None,
                        guesses_left: Some(left),
                    }
                }
            }
        } else {
            // Neutral or opposing card: the turn flips. Revealing the other
            // team's last card for them does not end the game.
            let paused = pass_turn(room, now)?;
            Outcome {
                word,
                kind,
                winner: None,
                turn_passed: true,
                paused,
                guesses_left: None,
            }
        };

        Ok(TxDecision::Commit(outcome))
    })
    .await?;

    announce_reveal(&store, code, &outcome).await;
    settle_timers(state, code, &room, &outcome).await;

    if let Some(winner) = outcome.winner {
        lobby_service::sync_index(&store, &room).await;
        info!(code = %code, winner = %winner.label(), "game over");
    }

    Ok(RevealResponse {
        kind: outcome.kind,
        game_over: outcome.winner.is_some(),
        winner: outcome.winner,
        turn_passed: outcome.turn_passed,
        guesses_left: outcome.guesses_left,
    })
}

/// Hand the turn to the other team without a reveal. Any member of the
/// current team may concede the rest of its guesses.
pub async fn end_turn(
    state: &SharedState,
    code: &RoomCode,
    player_id: &Uuid,
) -> Result<Room, GameError> {
    let store = state.require_store().await?;
    let now = store.now_ms();

    let (paused, room) = mutate_room(&store, code, |room| {
        require_active(room)?;
        let player = room.require_player(player_id)?;
        if player.team != Some(room.current_team) {
            return Err(GameError::Forbidden(
                "only the playing team may end its turn".to_string(),
            ));
        }
        if room.clue.is_none() {
            return Err(GameError::InvalidState(
                "there is no turn to end before a clue".to_string(),
            ));
        }
        let paused = pass_turn(room, now)?;
        Ok(TxDecision::Commit(paused))
    })
    .await?;

    after_turn_switch(state, &store, code, &room, paused).await;
    Ok(room)
}

/// Arm the expiry task for the room's running turn, replacing any armed
/// one. Untimed rooms and frozen turns disarm instead.
pub fn arm_turn_expiry(state: &SharedState, code: &RoomCode, room: &Room) {
    let Some(deadline) = room.turn_deadline() else {
        state.timers().disarm_turn_timer(code);
        return;
    };
    // The deadline is Some only when a turn is running.
    let Some(expected_start) = room.turn_started_at else {
        return;
    };

    let task_state = state.clone();
    let task_code = code.clone();
    let handle = tokio::spawn(async move {
        let Some(store) = task_state.session_store().await else {
            return;
        };
        let delay = deadline.saturating_sub(store.now_ms());
        sleep(Duration::from_millis(delay)).await;

        match expire_turn(&task_state, &task_code, expected_start).await {
            Ok(_) | Err(GameError::NotFound(_)) => {}
            Err(err) => {
                warn!(code = %task_code, error = %err, "turn expiry failed");
            }
        }
    });

    state.timers().arm_turn_timer(code, handle);
}

/// Timer-driven turn switch. A reveal or clue that restarted the turn in
/// the meantime makes this expiry stale, recognized by the start timestamp
/// it was armed against.
async fn expire_turn(
    state: &SharedState,
    code: &RoomCode,
    expected_start: u64,
) -> Result<(), GameError> {
    let store = state.require_store().await?;
    let now = store.now_ms();

    let (expired, room) = mutate_room(&store, code, |room| {
        if !room.phase.is_active() || room.turn_started_at != Some(expected_start) {
            return Ok(TxDecision::Skip(None));
        }
        let paused = pass_turn(room, now)?;
        Ok(TxDecision::Commit(Some(paused)))
    })
    .await?;

    if let Some(paused) = expired {
        let team = room.current_team;
        chat_service::post_game_system(
            &store,
            code,
            format!("Time is up, the {} team is on", team.label()),
        )
        .await;
        after_turn_switch(state, &store, code, &room, paused).await;
        debug!(code = %code, team = %team.label(), "turn expired");
    }

    Ok(())
}

/// In-place turn switch: flip the team, drop clue state and pending votes,
/// then decide whether the incoming team can actually play.
fn pass_turn(room: &mut Room, now: u64) -> Result<Option<PauseReason>, GameError> {
    room.current_team = room.current_team.opposing();
    room.clear_clue();
    room.clear_votes();

    match game_service::check_pause(room, room.current_team) {
        Some(reason) => {
            room.phase = room
                .phase
                .apply(PhaseEvent::Pause(reason, room.current_team))?;
            room.turn_started_at = None;
            Ok(Some(reason))
        }
        None => {
            room.turn_started_at = Some(now);
            Ok(None)
        }
    }
}

/// Freeze the room in its final state.
fn finish_game(room: &mut Room, winner: Team) -> Result<(), GameError> {
    room.phase = room.phase.apply(PhaseEvent::Finish(winner))?;
    room.clear_clue();
    room.clear_votes();
    room.turn_started_at = None;
    Ok(())
}

/// Timer and announcement fallout shared by explicit and timed-out turn
/// switches.
async fn after_turn_switch(
    state: &SharedState,
    store: &Arc<dyn SessionStore>,
    code: &RoomCode,
    room: &Room,
    paused: Option<PauseReason>,
) {
    match paused {
        Some(reason) => {
            state.timers().disarm_turn_timer(code);
            chat_service::post_game_system(
                store,
                code,
                game_service::pause_notice(reason, room.current_team),
            )
            .await;
            lobby_service::sync_index(store, room).await;
        }
        None => arm_turn_expiry(state, code, room),
    }
}

async fn announce_reveal(store: &Arc<dyn SessionStore>, code: &RoomCode, outcome: &Outcome) {
    let body = format!("{} was {}", outcome.word, describe(outcome.kind));
    chat_service::post_reveal(store, code, body, outcome.kind).await;

    if let Some(winner) = outcome.winner {
        chat_service::post_game_system(store, code, format!("The {} team wins", winner.label()))
            .await;
    }
}

async fn settle_timers(state: &SharedState, code: &RoomCode, room: &Room, outcome: &Outcome) {
    if outcome.winner.is_some() {
        state.timers().disarm_turn_timer(code);
        return;
    }
    if outcome.turn_passed {
        if let Some(store) = state.session_store().await {
            after_turn_switch(state, &store, code, room, outcome.paused).await;
        }
    }
    // A correct guess with budget left keeps the running timer untouched.
}

/// What a confirmed reveal did to the game, carried out of the write loop.
struct Outcome {
    word: String,
    kind: CardKind,
    winner: Option<Team>,
    turn_passed: bool,
    paused: Option<PauseReason>,
    guesses_left: Option<u8>,
}

fn describe(kind: CardKind) -> &'static str {
    match kind {
        CardKind::Red => "a red card",
        CardKind::Blue => "a blue card",
        CardKind::Neutral => "a neutral card",
        CardKind::Trap => "the trap",
    }
}

fn require_active(room: &Room) -> Result<(), GameError> {
    if room.phase.is_active() {
        return Ok(());
    }
    Err(GameError::InvalidState(match room.phase.pause() {
        Some(_) => "the game is paused".to_string(),
        None => "no game is in progress".to_string(),
    }))
}

fn require_guessing(room: &Room, player_id: &Uuid) -> Result<(), GameError> {
    let player = room.require_player(player_id)?;
    if player.team != Some(room.current_team) || player.role != Some(Role::Guesser) {
        return Err(GameError::Forbidden(format!(
            "only a {} guesser may act on cards right now",
            room.current_team.label()
        )));
    }
    if room.clue.is_none() {
        return Err(GameError::InvalidState("no clue is active".to_string()));
    }
    if room.guesses_left.unwrap_or(0) == 0 {
        return Err(GameError::InvalidState(
            "no guesses remain for this clue".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dao::session_store::SessionStore,
        services::game_service::{start_game, tests::staffed_room},
        state::phase::RoomPhase,
    };

    async fn started(code: &str) -> (SharedState, RoomCode, Vec<Uuid>) {
        let (state, code, ids) = staffed_room(code).await;
        start_game(&state, &code, &ids[0]).await.unwrap();
        (state, code, ids)
    }

    async fn store_of(state: &SharedState) -> Arc<dyn SessionStore> {
        state.require_store().await.unwrap()
    }

    /// Index of the first unrevealed card of the given kind.
    async fn card_index(
        state: &SharedState,
        code: &RoomCode,
        kind: CardKind,
    ) -> usize {
        let store = store_of(state).await;
        let (_, room) = store.read_room(code).await.unwrap().unwrap();
        room.board
            .iter()
            .position(|c| c.kind == kind && !c.revealed)
            .unwrap()
    }

    fn clue(player_id: Uuid, word: &str, count: u8) -> GiveClueRequest {
        GiveClueRequest {
            player_id,
            word: word.to_string(),
            count,
        }
    }

    fn card(player_id: Uuid, index: usize) -> CardActionRequest {
        CardActionRequest {
            player_id,
            card: index,
        }
    }

    #[test]
    fn quorum_is_one_for_small_teams() {
        assert_eq!(required_votes(1), 1);
        assert_eq!(required_votes(3), 1);
        assert_eq!(required_votes(4), 2);
        assert_eq!(required_votes(9), 2);
    }

    #[tokio::test]
    async fn clue_opens_a_guess_budget_of_count_plus_one() {
        let (state, code, ids) = started("CLUE").await;

        let room = give_clue(&state, &code, clue(ids[0], "animal", 2))
            .await
            .unwrap();
        let active = room.clue.unwrap();
        assert_eq!(active.word, "ANIMAL");
        assert_eq!(active.count, 2);
        assert_eq!(room.guesses_left, Some(3));
        assert!(room.first_clues.given(Team::Red));
        assert!(!room.first_clues.given(Team::Blue));
    }

    #[tokio::test]
    async fn clue_rejected_from_wrong_seat_or_twice() {
        let (state, code, ids) = started("CLUX").await;

        // A guesser cannot give the clue.
        let err = give_clue(&state, &code, clue(ids[1], "ANIMAL", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::Forbidden(_)));

        // Neither can the other team's clue-giver.
        let err = give_clue(&state, &code, clue(ids[2], "ANIMAL", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::Forbidden(_)));

        give_clue(&state, &code, clue(ids[0], "ANIMAL", 2))
            .await
            .unwrap();
        let err = give_clue(&state, &code, clue(ids[0], "MINERAL", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
    }

    #[tokio::test]
    async fn clue_may_not_repeat_a_board_word() {
        let (state, code, ids) = started("CLUB").await;
        let store = store_of(&state).await;
        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        let board_word = room.board[0].word.to_lowercase();

        let err = give_clue(&state, &code, clue(ids[0], &board_word, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn vote_toggles_and_needs_an_active_clue() {
        let (state, code, ids) = started("VOTE").await;

        let err = vote_card(&state, &code, card(ids[1], 0)).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));

        give_clue(&state, &code, clue(ids[0], "ANIMAL", 2))
            .await
            .unwrap();

        assert!(vote_card(&state, &code, card(ids[1], 0)).await.unwrap().voted);
        assert!(!vote_card(&state, &code, card(ids[1], 0)).await.unwrap().voted);

        // The clue-giver is not a guesser.
        let err = vote_card(&state, &code, card(ids[0], 0)).await.unwrap_err();
        assert!(matches!(err, GameError::Forbidden(_)));
    }

    #[tokio::test]
    async fn reveal_requires_quorum_and_own_vote() {
        let (state, code, ids) = started("QUOR").await;
        give_clue(&state, &code, clue(ids[0], "ANIMAL", 2))
            .await
            .unwrap();
        let index = card_index(&state, &code, CardKind::Red).await;

        let err = confirm_reveal(&state, &code, card(ids[1], index))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GameError::InsufficientVotes { have: 0, need: 1 }
        ));

        vote_card(&state, &code, card(ids[1], index)).await.unwrap();
        let reveal = confirm_reveal(&state, &code, card(ids[1], index))
            .await
            .unwrap();
        assert_eq!(reveal.kind, CardKind::Red);
        assert!(!reveal.game_over);
        assert!(!reveal.turn_passed);
        assert_eq!(reveal.guesses_left, Some(2));
    }

    #[tokio::test]
    async fn second_confirmation_loses_the_race() {
        let (state, code, ids) = started("RACE").await;
        give_clue(&state, &code, clue(ids[0], "ANIMAL", 2))
            .await
            .unwrap();
        let index = card_index(&state, &code, CardKind::Red).await;

        vote_card(&state, &code, card(ids[1], index)).await.unwrap();
        confirm_reveal(&state, &code, card(ids[1], index))
            .await
            .unwrap();

        let err = confirm_reveal(&state, &code, card(ids[1], index))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::AlreadyRevealed));
    }

    #[tokio::test]
    async fn neutral_card_passes_the_turn() {
        let (state, code, ids) = started("NEUT").await;
        give_clue(&state, &code, clue(ids[0], "ANIMAL", 2))
            .await
            .unwrap();
        let index = card_index(&state, &code, CardKind::Neutral).await;

        vote_card(&state, &code, card(ids[1], index)).await.unwrap();
        let reveal = confirm_reveal(&state, &code, card(ids[1], index))
            .await
            .unwrap();
        assert!(reveal.turn_passed);
        assert!(!reveal.game_over);

        let store = store_of(&state).await;
        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        assert_eq!(room.current_team, Team::Blue);
        assert!(room.clue.is_none());
        assert!(room.guesses_left.is_none());
        assert!(room.board.iter().all(|c| c.votes.is_empty()));
    }

    #[tokio::test]
    async fn trap_hands_the_win_to_the_other_team() {
        let (state, code, ids) = started("TRAP").await;
        give_clue(&state, &code, clue(ids[0], "ANIMAL", 2))
            .await
            .unwrap();
        let index = card_index(&state, &code, CardKind::Trap).await;

        vote_card(&state, &code, card(ids[1], index)).await.unwrap();
        let reveal = confirm_reveal(&state, &code, card(ids[1], index))
            .await
            .unwrap();
        assert!(reveal.game_over);
        assert_eq!(reveal.winner, Some(Team::Blue));

        let store = store_of(&state).await;
        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        assert_eq!(room.phase, RoomPhase::GameOver { winner: Team::Blue });
        assert!(room.clue.is_none());
        assert!(room.turn_started_at.is_none());
    }

    #[tokio::test]
    async fn revealing_every_own_card_wins() {
        let (state, code, ids) = started("WINS").await;
        let store = store_of(&state).await;

        // Leave a single red card unrevealed.
        let (revision, mut room) = store.read_room(&code).await.unwrap().unwrap();
        for extra in room
            .board
            .iter_mut()
            .filter(|c| c.kind == CardKind::Red)
            .skip(1)
        {
            extra.revealed = true;
        }
        store.swap_room(&code, revision, room).await.unwrap();

        give_clue(&state, &code, clue(ids[0], "ANIMAL", 1))
            .await
            .unwrap();
        let index = card_index(&state, &code, CardKind::Red).await;
        vote_card(&state, &code, card(ids[1], index)).await.unwrap();
        let reveal = confirm_reveal(&state, &code, card(ids[1], index))
            .await
            .unwrap();

        assert!(reveal.game_over);
        assert_eq!(reveal.winner, Some(Team::Red));
    }

    #[tokio::test]
    async fn exhausted_guesses_pass_the_turn() {
        let (state, code, ids) = started("EXHA").await;
        give_clue(&state, &code, clue(ids[0], "ANIMAL", 1))
            .await
            .unwrap();

        let first = card_index(&state, &code, CardKind::Red).await;
        vote_card(&state, &code, card(ids[1], first)).await.unwrap();
        let reveal = confirm_reveal(&state, &code, card(ids[1], first))
            .await
            .unwrap();
        assert!(!reveal.turn_passed);
        assert_eq!(reveal.guesses_left, Some(1));

        let second = card_index(&state, &code, CardKind::Red).await;
        vote_card(&state, &code, card(ids[1], second)).await.unwrap();
        let reveal = confirm_reveal(&state, &code, card(ids[1], second))
            .await
            .unwrap();
        assert!(reveal.turn_passed);
        assert_eq!(reveal.guesses_left, None);

        let store = store_of(&state).await;
        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        assert_eq!(room.current_team, Team::Blue);
    }

    #[tokio::test]
    async fn opponents_last_card_does_not_end_the_game() {
        let (state, code, ids) = started("OPPL").await;
        let store = store_of(&state).await;

        // Leave a single blue card unrevealed.
        let (revision, mut room) = store.read_room(&code).await.unwrap().unwrap();
        for extra in room
            .board
            .iter_mut()
            .filter(|c| c.kind == CardKind::Blue)
            .skip(1)
        {
            extra.revealed = true;
        }
        store.swap_room(&code, revision, room).await.unwrap();

        give_clue(&state, &code, clue(ids[0], "ANIMAL", 2))
            .await
            .unwrap();
        let index = card_index(&state, &code, CardKind::Blue).await;
        vote_card(&state, &code, card(ids[1], index)).await.unwrap();
        let reveal = confirm_reveal(&state, &code, card(ids[1], index))
            .await
            .unwrap();

        assert!(!reveal.game_over);
        assert!(reveal.turn_passed);

        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        assert_eq!(room.phase, RoomPhase::Active);
        assert_eq!(room.current_team, Team::Blue);
    }

    #[tokio::test]
    async fn end_turn_is_reserved_to_the_playing_team() {
        let (state, code, ids) = started("ENDT").await;
        give_clue(&state, &code, clue(ids[0], "ANIMAL", 2))
            .await
            .unwrap();

        let err = end_turn(&state, &code, &ids[3]).await.unwrap_err();
        assert!(matches!(err, GameError::Forbidden(_)));

        let room = end_turn(&state, &code, &ids[1]).await.unwrap();
        assert_eq!(room.current_team, Team::Blue);
        assert!(room.clue.is_none());
    }

    #[tokio::test]
    async fn turn_pass_onto_an_empty_team_pauses() {
        let (state, code, ids) = started("PAWZ").await;
        let store = store_of(&state).await;
        let (revision, mut room) = store.read_room(&code).await.unwrap().unwrap();
        room.player_mut(&ids[2]).unwrap().connected = false;
        room.player_mut(&ids[3]).unwrap().connected = false;
        store.swap_room(&code, revision, room).await.unwrap();

        give_clue(&state, &code, clue(ids[0], "ANIMAL", 2))
            .await
            .unwrap();
        let room = end_turn(&state, &code, &ids[1]).await.unwrap();

        assert_eq!(
            room.phase.pause(),
            Some((PauseReason::TeamDisconnected, Team::Blue))
        );
        assert!(room.turn_started_at.is_none());
    }

    #[tokio::test]
    async fn every_reveal_posts_a_log_entry() {
        let (state, code, ids) = started("LOGS").await;
        give_clue(&state, &code, clue(ids[0], "ANIMAL", 2))
            .await
            .unwrap();
        let index = card_index(&state, &code, CardKind::Red).await;
        vote_card(&state, &code, card(ids[1], index)).await.unwrap();
        confirm_reveal(&state, &code, card(ids[1], index))
            .await
            .unwrap();

        let store = store_of(&state).await;
        let messages = store.list_messages(&code).await.unwrap();
        let reveal = messages
            .iter()
            .find(|m| m.kind == crate::dao::models::MessageKind::Reveal)
            .expect("reveal entry");
        assert!(reveal.body.contains("a red card"));
        assert_eq!(reveal.revealed_kind, Some(CardKind::Red));
    }

    #[tokio::test]
    async fn timed_turn_expires_into_the_next_team() {
        let (state, code, ids) = staffed_room("TIME").await;
        let store = store_of(&state).await;
        let (revision, mut room) = store.read_room(&code).await.unwrap().unwrap();
        room.timer_secs = 60;
        store.swap_room(&code, revision, room).await.unwrap();

        start_game(&state, &code, &ids[0]).await.unwrap();
        assert!(state.timers().turn_timer_armed(&code));

        // Drive the expiry directly instead of sleeping out the minute.
        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        let started = room.turn_started_at.unwrap();
        expire_turn(&state, &code, started).await.unwrap();

        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        assert_eq!(room.current_team, Team::Blue);

        // A stale expiry from the previous turn is ignored.
        expire_turn(&state, &code, started.wrapping_sub(5)).await.unwrap();
        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        assert_eq!(room.current_team, Team::Blue);
    }
}
