//! Background maintenance: liveness sweeps that derive `connected` from the
//! heartbeat table, stale-player demotion, chat-log pruning, abandoned-room
//! collection, and discovery-index orphan cleanup.
//!
//! Each live room owns one janitor loop; a global sweep restores loops after
//! a restart and clears index entries whose room is gone.

use std::sync::atomic::Ordering;

use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::RoomCode,
    dto::rooms::PruneStaleResponse,
    error::GameError,
    services::{TxDecision, chat_service, game_service, lobby_service, mutate_room, ownership},
    state::SharedState,
};

/// What one room sweep did, for logging and tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Players flipped to disconnected because their heartbeat lapsed.
    pub disconnected: Vec<Uuid>,
    /// Players demoted to spectators after a long disconnection.
    pub demoted: Vec<Uuid>,
    /// Chat messages pruned.
    pub pruned_messages: usize,
    /// Whether the room was collected as abandoned.
    pub deleted: bool,
}

/// Start the room's janitor loop unless one is already running.
pub fn ensure_room_janitor(state: &SharedState, code: &RoomCode) {
    let task_state = state.clone();
    let task_code = code.clone();
    state.timers().ensure_janitor(code, move || {
        tokio::spawn(async move {
            let interval = task_state.config().sweep_interval;
            loop {
                sleep(interval).await;
                match guarded_sweep(&task_state, &task_code).await {
                    Ok(Some(report)) if report.deleted => break,
                    Ok(_) => {}
                    Err(GameError::NotFound(_)) => break,
                    Err(err) => {
                        warn!(code = %task_code, error = %err, "room sweep failed");
                    }
                }
            }
        })
    });
}

/// Run one sweep unless the previous one is still in flight. The interval
/// can fire again before a slow pass finishes; overlapping passes would
/// fight over the same writes.
async fn guarded_sweep(
    state: &SharedState,
    code: &RoomCode,
) -> Result<Option<SweepReport>, GameError> {
    let guard = state.timers().sweep_guard(code);
    if guard
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        debug!(code = %code, "sweep still running, skipping this tick");
        return Ok(None);
    }

    let result = sweep_room(state, code).await;
    guard.store(false, Ordering::SeqCst);
    result.map(Some)
}

/// One maintenance pass over a room.
pub async fn sweep_room(state: &SharedState, code: &RoomCode) -> Result<SweepReport, GameError> {
    let store = state.require_store().await?;
    let now = store.now_ms();
    let mut report = SweepReport::default();

    let Some((_, room)) = store.read_room(code).await? else {
        state.timers().stop_room(code);
        state.presence().forget_room(code);
        return Err(GameError::NotFound(format!("room `{code}` not found")));
    };

    // Collect abandoned rooms before doing any per-player work.
    let ttl_ms = state.config().room_ttl.as_millis() as u64;
    let abandoned = !room.players.is_empty()
        && room.players.values().all(|p| {
            !p.connected && now.saturating_sub(p.last_seen) >= ttl_ms
        });
    if abandoned {
        ownership::teardown_room(state, &store, code).await?;
        report.deleted = true;
        return Ok(report);
    }

    report.disconnected = demote_lapsed_heartbeats(state, code, now).await?;
    report.demoted = demote_stale_players(state, code, now).await?;

    match store.list_messages(code).await {
        Ok(messages) if messages.len() > state.config().message_prune_threshold => {
            match chat_service::prune_to_keep(&store, code, state.config().message_keep).await {
                Ok(count) => report.pruned_messages = count,
                Err(err) => warn!(code = %code, error = %err, "sweep chat prune failed"),
            }
        }
        Ok(_) => {}
        Err(err) => warn!(code = %code, error = %err, "sweep message count check failed"),
    }

    if let Some((_, room)) = store.read_room(code).await? {
        lobby_service::sync_index(&store, &room).await;
    }

    if report != SweepReport::default() {
        debug!(
            code = %code,
            disconnected = report.disconnected.len(),
            demoted = report.demoted.len(),
            pruned = report.pruned_messages,
            "sweep finished"
        );
    }
    Ok(report)
}

/// Flip players whose heartbeat lapsed to disconnected and apply the
/// fallout: owner succession and the auto-pause check for the current team.
async fn demote_lapsed_heartbeats(
    state: &SharedState,
    code: &RoomCode,
    now: u64,
) -> Result<Vec<Uuid>, GameError> {
    let store = state.require_store().await?;
    let timeout_ms = state.config().liveness_timeout.as_millis() as u64;
    let lapsed = state.presence().lapsed(code, timeout_ms, now);
    if lapsed.is_empty() {
        return Ok(Vec::new());
    }

    let (dropped, room) = mutate_room(&store, code, |room| {
        let mut dropped = Vec::new();
        for (id, last_beat) in &lapsed {
            if let Some(player) = room.player_mut(id)
                && player.connected
            {
                player.connected = false;
                player.last_seen = *last_beat;
                dropped.push(*id);
            }
        }
        if dropped.is_empty() {
            return Ok(TxDecision::Skip(dropped));
        }
        Ok(TxDecision::Commit(dropped))
    })
    .await?;

    if dropped.is_empty() {
        return Ok(dropped);
    }

    info!(code = %code, players = dropped.len(), "heartbeats lapsed, players disconnected");
    if dropped.contains(&room.owner_id) {
        // Grace period applies: a lapsed heartbeat may be a network blip.
        ownership::reassign_owner_if_needed(state, code, false, true).await?;
    }
    game_service::apply_pause_fallout(state, code, room).await?;
    Ok(dropped)
}

/// Demote players who have been disconnected longer than the stale window
/// back to spectators, freeing their seats.
async fn demote_stale_players(
    state: &SharedState,
    code: &RoomCode,
    now: u64,
) -> Result<Vec<Uuid>, GameError> {
    let store = state.require_store().await?;
    let stale_ms = state.config().stale_after.as_millis() as u64;

    let (demoted, room) = mutate_room(&store, code, |room| {
        let stale: Vec<Uuid> = room
            .players
            .iter()
            .filter(|(_, p)| {
                !p.connected
                    && p.team.is_some()
                    && now.saturating_sub(p.last_seen) >= stale_ms
            })
            .map(|(id, _)| *id)
            .collect();
        if stale.is_empty() {
            return Ok(TxDecision::Skip(stale));
        }
        for id in &stale {
            room.demote(id);
        }
        Ok(TxDecision::Commit(stale))
    })
    .await?;

    if !demoted.is_empty() {
        info!(code = %code, players = demoted.len(), "stale players demoted to spectators");
        chat_service::post_system(
            &store,
            code,
            format!("{} inactive player(s) moved to spectators", demoted.len()),
        )
        .await;
        game_service::apply_pause_fallout(state, code, room).await?;
    }
    Ok(demoted)
}

/// Owner-triggered stale demotion, exposed over HTTP. The janitor calls the
/// same rule without a caller.
pub async fn prune_stale_players(
    state: &SharedState,
    code: &RoomCode,
    requester: &Uuid,
) -> Result<PruneStaleResponse, GameError> {
    let store = state.require_store().await?;
    let Some((_, room)) = store.read_room(code).await? else {
        return Err(GameError::NotFound(format!("room `{code}` not found")));
    };
    room.require_owner(requester)?;

    let demoted = demote_stale_players(state, code, store.now_ms()).await?;
    Ok(PruneStaleResponse { demoted })
}

/// Process-wide sweep loop: re-establish per-room janitors after a restart
/// and drop discovery entries whose room no longer exists.
pub async fn run_global_sweep(state: SharedState) {
    let interval = state.config().sweep_interval;
    loop {
        sleep(interval).await;
        if let Err(err) = global_sweep_once(&state).await {
            warn!(error = %err, "global sweep failed");
        }
    }
}

async fn global_sweep_once(state: &SharedState) -> Result<(), GameError> {
    let store = state.require_store().await?;
    let codes = store.list_room_codes().await?;
    for code in &codes {
        ensure_room_janitor(state, code);
    }

    for entry in store.list_index_entries().await? {
        if !codes.contains(&entry.code) {
            warn!(code = %entry.code, "removing orphaned discovery entry");
            if let Err(err) = store.delete_index_entry(&entry.code).await {
                warn!(code = %entry.code, error = %err, "orphan removal failed");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dao::models::{MessageDoc, MessageKind, PublicRoomEntry, RoomStatus, Team, Visibility},
        dao::session_store::{SessionStore, memory::MemoryStore},
        state::{
            AppState,
            phase::{PauseReason, RoomPhase},
            room::{Player, Room},
        },
    };

    async fn seeded(code: &str, players: usize) -> (SharedState, RoomCode, Vec<Uuid>) {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let code = RoomCode::new(code);
        let ids: Vec<Uuid> = (1..=players as u128).map(Uuid::from_u128).collect();
        let now = store.now_ms();

        let mut room = Room::new(
            code.clone(),
            "Janitor".to_string(),
            ids[0],
            Visibility::Private,
            12,
            Team::Red,
            now,
        );
        for (n, id) in ids.iter().enumerate() {
            room.players
                .insert(*id, Player::new(format!("Player {n}"), None, now));
        }
        store.insert_room(room).await.unwrap();

        let state = AppState::shared_for_tests(store);
        for id in &ids {
            state.presence().record(&code, *id, now);
        }
        (state, code, ids)
    }

    #[tokio::test]
    async fn quiet_room_sweeps_to_an_empty_report() {
        let (state, code, _) = seeded("CALM", 2).await;
        let report = sweep_room(&state, &code).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn lapsed_heartbeat_disconnects_the_player() {
        let (state, code, ids) = seeded("LAPS", 2).await;
        let store = state.require_store().await.unwrap();

        // Rewind the member's heartbeat past the liveness timeout.
        let now = store.now_ms();
        let timeout = state.config().liveness_timeout.as_millis() as u64;
        state.presence().record(&code, ids[1], now - timeout - 1_000);

        let report = sweep_room(&state, &code).await.unwrap();
        assert_eq!(report.disconnected, vec![ids[1]]);

        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        assert!(!room.player(&ids[1]).unwrap().connected);
        // Records survive disconnection; only kicks remove them.
        assert_eq!(room.players.len(), 2);
    }

    #[tokio::test]
    async fn lapsed_clue_giver_pauses_an_active_game() {
        use crate::dao::models::Role;

        let (state, code, ids) = seeded("PZZZ", 4).await;
        let store = state.require_store().await.unwrap();
        let (revision, mut room) = store.read_room(&code).await.unwrap().unwrap();
        room.assign_role(&ids[0], Some(Team::Red), Some(Role::ClueGiver))
            .unwrap();
        room.assign_role(&ids[1], Some(Team::Red), Some(Role::Guesser))
            .unwrap();
        room.assign_role(&ids[2], Some(Team::Blue), Some(Role::ClueGiver))
            .unwrap();
        room.assign_role(&ids[3], Some(Team::Blue), Some(Role::Guesser))
            .unwrap();
        room.phase = RoomPhase::Active;
        room.current_team = Team::Red;
        store.swap_room(&code, revision, room).await.unwrap();

        let now = store.now_ms();
        let timeout = state.config().liveness_timeout.as_millis() as u64;
        state.presence().record(&code, ids[0], now - timeout - 1_000);

        sweep_room(&state, &code).await.unwrap();

        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        assert_eq!(
            room.phase.pause(),
            Some((PauseReason::ClueGiverDisconnected, Team::Red))
        );
    }

    #[tokio::test]
    async fn stale_disconnected_player_loses_their_seat() {
        use crate::dao::models::Role;

        let (state, code, ids) = seeded("STAL", 2).await;
        let store = state.require_store().await.unwrap();
        let stale_ms = state.config().stale_after.as_millis() as u64;
        let now = store.now_ms();

        let (revision, mut room) = store.read_room(&code).await.unwrap().unwrap();
        room.assign_role(&ids[1], Some(Team::Blue), Some(Role::Guesser))
            .unwrap();
        let player = room.player_mut(&ids[1]).unwrap();
        player.connected = false;
        player.last_seen = now.saturating_sub(stale_ms + 1_000);
        store.swap_room(&code, revision, room).await.unwrap();
        state.presence().forget(&code, ids[1]);

        let report = sweep_room(&state, &code).await.unwrap();
        assert_eq!(report.demoted, vec![ids[1]]);

        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        assert!(room.player(&ids[1]).unwrap().team.is_none());
    }

    #[tokio::test]
    async fn owner_triggered_prune_reports_demoted_ids() {
        let (state, code, ids) = seeded("PRUN", 2).await;
        let store = state.require_store().await.unwrap();
        let stale_ms = state.config().stale_after.as_millis() as u64;
        let now = store.now_ms();

        let (revision, mut room) = store.read_room(&code).await.unwrap().unwrap();
        room.assign_role(&ids[1], Some(Team::Red), Some(crate::dao::models::Role::Guesser))
            .unwrap();
        let player = room.player_mut(&ids[1]).unwrap();
        player.connected = false;
        player.last_seen = now.saturating_sub(stale_ms + 1_000);
        store.swap_room(&code, revision, room).await.unwrap();
        state.presence().forget(&code, ids[1]);

        let err = prune_stale_players(&state, &code, &ids[1]).await.unwrap_err();
        assert!(matches!(err, GameError::NotOwner));

        let response = prune_stale_players(&state, &code, &ids[0]).await.unwrap();
        assert_eq!(response.demoted, vec![ids[1]]);
    }

    #[tokio::test]
    async fn abandoned_room_is_collected() {
        let (state, code, ids) = seeded("GONE", 2).await;
        let store = state.require_store().await.unwrap();
        let ttl_ms = state.config().room_ttl.as_millis() as u64;
        let now = store.now_ms();

        let (revision, mut room) = store.read_room(&code).await.unwrap().unwrap();
        for id in &ids {
            let player = room.player_mut(id).unwrap();
            player.connected = false;
            player.last_seen = now.saturating_sub(ttl_ms + 1_000);
        }
        store.swap_room(&code, revision, room).await.unwrap();

        let report = sweep_room(&state, &code).await.unwrap();
        assert!(report.deleted);
        assert!(store.read_room(&code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_prunes_an_overgrown_chat_log() {
        let (state, code, ids) = seeded("CHTP", 2).await;
        let store = state.require_store().await.unwrap();
        let threshold = state.config().message_prune_threshold;
        let keep = state.config().message_keep;

        for n in 0..(threshold + 25) {
            let doc = MessageDoc {
                id: Uuid::new_v4(),
                player_id: Some(ids[0]),
                player_name: Some("Player 0".to_string()),
                avatar: None,
                body: format!("message {n}"),
                kind: MessageKind::Chat,
                clue_team: None,
                revealed_kind: None,
                reactions: Default::default(),
                sent_at: n as u64,
            };
            store.append_message(&code, doc).await.unwrap();
        }

        let report = sweep_room(&state, &code).await.unwrap();
        assert_eq!(report.pruned_messages, threshold + 25 - keep);
        assert_eq!(store.list_messages(&code).await.unwrap().len(), keep);
    }

    #[tokio::test]
    async fn global_sweep_drops_orphaned_index_entries() {
        let (state, code, _) = seeded("ORPH", 2).await;
        let store = state.require_store().await.unwrap();

        store
            .put_index_entry(PublicRoomEntry {
                code: RoomCode::new("DEAD"),
                name: "Dead room".to_string(),
                owner_name: "Nobody".to_string(),
                connected_players: 0,
                capacity: 12,
                status: RoomStatus::Lobby,
                timer_secs: 0,
                created_at: 0,
            })
            .await
            .unwrap();

        global_sweep_once(&state).await.unwrap();

        assert!(store.list_index_entries().await.unwrap().is_empty());
        // The live room got a janitor loop out of the pass.
        state.timers().stop_room(&code);
    }
}
