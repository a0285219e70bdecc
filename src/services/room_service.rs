//! Room membership and settings: creation, join/rejoin, leave, heartbeats,
//! the owner-only room settings, and kick-with-ban.

use rand::{Rng, rng};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        models::{RoomCode, Team, Visibility},
        session_store::SwapOutcome,
    },
    dto::{
        rooms::{
            CreateRoomRequest, JoinRoomRequest, KickPlayerRequest, SetCustomWordsRequest,
            SetLockedRequest, SetRoomNameRequest, SetTimerRequest, SetWordPacksRequest,
        },
        snapshot::RoomSnapshot,
    },
    error::GameError,
    services::{TxDecision, chat_service, janitor, lobby_service, mutate_room, ownership},
    state::{SharedState, room::{Player, Room}},
};

/// Length of generated join codes.
const CODE_LENGTH: usize = 4;
/// Attempts to find a free join code before giving up.
const CODE_ATTEMPTS: u32 = 16;
/// Alphabet for generated codes; 0/O and 1/I are left out.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Create a room under a freshly generated join code, owned by the creator.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<(RoomCode, RoomSnapshot), GameError> {
    let store = state.require_store().await?;
    let now = store.now_ms();

    let name = request
        .room_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("{}'s room", request.player_name.trim()));
    let visibility = request.visibility.unwrap_or(Visibility::Private);

    for _ in 0..CODE_ATTEMPTS {
        let code = generate_code(&mut rng());
        let mut room = new_room(state, &code, name.clone(), request.player_id, visibility, now);
        room.players.insert(
            request.player_id,
            Player::new(request.player_name.trim().to_string(), request.avatar.clone(), now),
        );

        match store.insert_room(room.clone()).await? {
            SwapOutcome::Committed(_) => {
                state.presence().record(&code, request.player_id, now);
                janitor::ensure_room_janitor(state, &code);
                lobby_service::sync_index(&store, &room).await;
                info!(code = %code, owner = %request.player_id, "room created");
                return Ok((code, RoomSnapshot::from(&room)));
            }
            // Another creator grabbed the code; draw again.
            SwapOutcome::Conflict => continue,
            SwapOutcome::Missing => unreachable!("insert never reports a missing room"),
        }
    }

    Err(GameError::InvalidState(
        "could not allocate a free room code".to_string(),
    ))
}

/// Join a room by code, creating it when the code is unclaimed.
///
/// Existing players always get back in (keeping team and role); new players
/// are admitted as spectators subject to the ban list, the lock, the
/// capacity, and name uniqueness among connected players.
pub async fn join_room(
    state: &SharedState,
    code: &RoomCode,
    request: JoinRoomRequest,
) -> Result<RoomSnapshot, GameError> {
    let store = state.require_store().await?;
    let now = store.now_ms();
    let name = request.name.trim().to_string();

    if store.read_room(code).await?.is_none() {
        let visibility = request.visibility.unwrap_or(Visibility::Private);
        let mut room = new_room(
            state,
            code,
            format!("{name}'s room"),
            request.player_id,
            visibility,
            now,
        );
        room.players.insert(
            request.player_id,
            Player::new(name.clone(), request.avatar.clone(), now),
        );

        // A racing creator of the same code wins; fall through to a normal
        // join against their room.
        if let SwapOutcome::Committed(_) = store.insert_room(room.clone()).await? {
            state.presence().record(code, request.player_id, now);
            janitor::ensure_room_janitor(state, code);
            lobby_service::sync_index(&store, &room).await;
            info!(code = %code, owner = %request.player_id, "room created on first join");
            return Ok(RoomSnapshot::from(&room));
        }
    }

    let (newcomer, room) = mutate_room(&store, code, |room| {
        room.purge_expired_bans(now);
        if let Some(remaining) = room.ban_remaining(&request.player_id, now) {
            return Err(GameError::Banned {
                remaining_secs: remaining.div_ceil(1_000),
            });
        }

        if let Some(player) = room.player_mut(&request.player_id) {
            // Rejoin: locked rooms and full rooms never shut out their own.
            player.connected = true;
            player.last_seen = now;
            player.avatar = request.avatar.clone();
            return Ok(TxDecision::Commit(false));
        }

        if room.locked {
            return Err(GameError::RoomLocked);
        }
        if room.players.len() >= room.capacity {
            return Err(GameError::RoomFull);
        }
        if room.connected_name_taken(&name, &request.player_id) {
            return Err(GameError::InvalidInput(format!(
                "the name `{name}` is already in use"
            )));
        }

        room.players.insert(
            request.player_id,
            Player::new(name.clone(), request.avatar.clone(), now),
        );
        Ok(TxDecision::Commit(true))
    })
    .await?;

    state.presence().record(code, request.player_id, now);
    if room.owner_id == request.player_id {
        // The owner is back; a pending succession retry is moot.
        ownership::cancel_grace_retry(state, code);
    }
    janitor::ensure_room_janitor(state, code);
    lobby_service::sync_index(&store, &room).await;

    if newcomer {
        chat_service::post_system(&store, code, format!("{name} joined the room")).await;
        debug!(code = %code, player = %request.player_id, "player joined");
    } else {
        debug!(code = %code, player = %request.player_id, "player rejoined");
    }

    Ok(RoomSnapshot::from(&room))
}

/// Leave the room explicitly. The record stays (only kicks remove it); the
/// player is marked disconnected, their votes are withdrawn, and ownership
/// moves on immediately when the leaver held it.
pub async fn leave_room(
    state: &SharedState,
    code: &RoomCode,
    player_id: &Uuid,
) -> Result<(), GameError> {
    let store = state.require_store().await?;
    let now = store.now_ms();

    let (name, room) = mutate_room(&store, code, |room| {
        let player = room
            .player_mut(player_id)
            .ok_or_else(|| GameError::NotFound(format!("player {player_id} in room {code}")))?;
        player.connected = false;
        player.last_seen = now;
        let name = player.name.clone();
        room.strip_votes_of(player_id);
        Ok(TxDecision::Commit(name))
    })
    .await?;

    state.presence().forget(code, *player_id);

    if room.connected_count() == 0 {
        ownership::teardown_room(state, &store, code).await?;
        return Ok(());
    }

    chat_service::post_system(&store, code, format!("{name} left the room")).await;
    // Explicit leave is unambiguous: no grace period for a leaving owner.
    ownership::reassign_owner_if_needed(state, code, true, true).await?;
    let room = crate::services::game_service::apply_pause_fallout(state, code, room).await?;
    lobby_service::sync_index(&store, &room).await;
    debug!(code = %code, player = %player_id, "player left");
    Ok(())
}

/// Heartbeat from a live client connection. Reconnecting clients call this
/// to re-arm their disconnect handling; it also flips a player back to
/// connected after a transport flap.
pub async fn heartbeat(
    state: &SharedState,
    code: &RoomCode,
    player_id: &Uuid,
) -> Result<(), GameError> {
    let store = state.require_store().await?;
    let now = store.now_ms();

    let (was_disconnected, room) = mutate_room(&store, code, |room| {
        let player = room
            .player_mut(player_id)
            .ok_or_else(|| GameError::NotFound(format!("player {player_id} in room {code}")))?;
        player.last_seen = now;
        if player.connected {
            return Ok(TxDecision::Skip(false));
        }
        player.connected = true;
        Ok(TxDecision::Commit(true))
    })
    .await?;

    state.presence().record(code, *player_id, now);

    if was_disconnected {
        if room.owner_id == *player_id {
            ownership::cancel_grace_retry(state, code);
        }
        lobby_service::sync_index(&store, &room).await;
        debug!(code = %code, player = %player_id, "player reconnected");
    }

    Ok(())
}

/// Current state of a room.
pub async fn room_snapshot(
    state: &SharedState,
    code: &RoomCode,
) -> Result<RoomSnapshot, GameError> {
    let store = state.require_store().await?;
    let Some((_, room)) = store.read_room(code).await? else {
        return Err(GameError::NotFound(format!("room `{code}` not found")));
    };
    Ok(RoomSnapshot::from(&room))
}

/// Lock or unlock the room against new players. Locking also delists the
/// room from discovery.
pub async fn set_locked(
    state: &SharedState,
    code: &RoomCode,
    request: SetLockedRequest,
) -> Result<RoomSnapshot, GameError> {
    let store = state.require_store().await?;

    let (_, room) = mutate_room(&store, code, |room| {
        room.require_owner(&request.player_id)?;
        if room.locked == request.locked {
            return Ok(TxDecision::Skip(()));
        }
        room.locked = request.locked;
        Ok(TxDecision::Commit(()))
    })
    .await?;

    lobby_service::sync_index(&store, &room).await;
    Ok(RoomSnapshot::from(&room))
}

/// Rename the room.
pub async fn set_room_name(
    state: &SharedState,
    code: &RoomCode,
    request: SetRoomNameRequest,
) -> Result<RoomSnapshot, GameError> {
    let store = state.require_store().await?;

    let (_, room) = mutate_room(&store, code, |room| {
        room.require_owner(&request.player_id)?;
        room.name = request.name.trim().to_string();
        Ok(TxDecision::Commit(()))
    })
    .await?;

    lobby_service::sync_index(&store, &room).await;
    Ok(RoomSnapshot::from(&room))
}

/// Select the turn timer preset. Takes effect from the next turn start.
pub async fn set_timer(
    state: &SharedState,
    code: &RoomCode,
    request: SetTimerRequest,
) -> Result<RoomSnapshot, GameError> {
    let store = state.require_store().await?;

    let (_, room) = mutate_room(&store, code, |room| {
        room.require_owner(&request.player_id)?;
        room.timer_secs = request.timer_secs;
        Ok(TxDecision::Commit(()))
    })
    .await?;

    lobby_service::sync_index(&store, &room).await;
    Ok(RoomSnapshot::from(&room))
}

/// Select the word packs used for board generation. Rejected once a game
/// has started; the board in play was drawn from the old selection.
pub async fn set_word_packs(
    state: &SharedState,
    code: &RoomCode,
    request: SetWordPacksRequest,
) -> Result<RoomSnapshot, GameError> {
    let store = state.require_store().await?;

    for pack in &request.packs {
        if !state.words().has_pack(pack) {
            return Err(GameError::InvalidInput(format!("unknown word pack `{pack}`")));
        }
    }

    let (_, room) = mutate_room(&store, code, |room| {
        room.require_owner(&request.player_id)?;
        require_lobby(room)?;
        room.word_packs = request.packs.clone();
        Ok(TxDecision::Commit(()))
    })
    .await?;

    Ok(RoomSnapshot::from(&room))
}

/// Replace the room's custom word list. Rejected once a game has started.
pub async fn set_custom_words(
    state: &SharedState,
    code: &RoomCode,
    request: SetCustomWordsRequest,
) -> Result<RoomSnapshot, GameError> {
    let store = state.require_store().await?;

    let (_, room) = mutate_room(&store, code, |room| {
        room.require_owner(&request.player_id)?;
        require_lobby(room)?;
        room.custom_words = request.words.clone();
        Ok(TxDecision::Commit(()))
    })
    .await?;

    Ok(RoomSnapshot::from(&room))
}

/// Remove a player from the room entirely and ban them for the configured
/// duration. Owner-only; the owner cannot kick themselves.
pub async fn kick_player(
    state: &SharedState,
    code: &RoomCode,
    request: KickPlayerRequest,
) -> Result<RoomSnapshot, GameError> {
    let store = state.require_store().await?;
    let ban_ms = state.config().ban_duration.as_millis() as u64;
    // Ban expiry is computed on the store clock so a skewed client clock
    // cannot shorten it.
    let now = store.now_ms();

    let (name, room) = mutate_room(&store, code, |room| {
        room.require_owner(&request.player_id)?;
        if request.player_id == request.target_id {
            return Err(GameError::Forbidden(
                "the owner cannot kick themselves".to_string(),
            ));
        }
        let target = room.require_player(&request.target_id)?;
        let name = target.name.clone();

        room.players.shift_remove(&request.target_id);
        room.strip_votes_of(&request.target_id);
        room.bans.insert(request.target_id, now + ban_ms);
        Ok(TxDecision::Commit(name))
    })
    .await?;

    state.presence().forget(code, request.target_id);
    chat_service::post_system(&store, code, format!("{name} was kicked from the room")).await;
    // A kicked clue-giver or last guesser can leave the current team unable
    // to play.
    let room = crate::services::game_service::apply_pause_fallout(state, code, room).await?;
    lobby_service::sync_index(&store, &room).await;
    info!(code = %code, target = %request.target_id, "player kicked");
    Ok(RoomSnapshot::from(&room))
}

fn new_room(
    state: &SharedState,
    code: &RoomCode,
    name: String,
    owner_id: Uuid,
    visibility: Visibility,
    now: u64,
) -> Room {
    let mut room = Room::new(
        code.clone(),
        name,
        owner_id,
        visibility,
        state.config().default_capacity,
        draw_starting_team(&mut rng()),
        now,
    );
    room.word_packs = vec!["standard".to_string()];
    room
}

fn draw_starting_team(rng: &mut impl Rng) -> Team {
    if rng.random_bool(0.5) {
        Team::Red
    } else {
        Team::Blue
    }
}

fn generate_code(rng: &mut impl Rng) -> RoomCode {
    let raw: String = (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    RoomCode::new(&raw)
}

fn require_lobby(room: &Room) -> Result<(), GameError> {
    if room.phase.is_started() {
        return Err(GameError::InvalidState(
            "word settings cannot change once a game has started".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dao::session_store::{SessionStore, memory::MemoryStore},
        state::AppState,
    };

    fn join(name: &str) -> JoinRoomRequest {
        JoinRoomRequest {
            player_id: Uuid::new_v4(),
            name: name.to_string(),
            avatar: None,
            visibility: None,
        }
    }

    async fn fresh_state() -> SharedState {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        AppState::shared_for_tests(store)
    }

    #[tokio::test]
    async fn first_join_creates_the_room_with_the_joiner_as_owner() {
        let state = fresh_state().await;
        let code = RoomCode::new("NEWR");
        let request = join("Ada");
        let owner = request.player_id;

        let snapshot = join_room(&state, &code, request).await.unwrap();
        assert_eq!(snapshot.owner_id, owner);
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.word_packs, vec!["standard".to_string()]);
    }

    #[tokio::test]
    async fn create_room_allocates_a_code_and_lists_public_rooms() {
        let state = fresh_state().await;
        let (code, snapshot) = create_room(
            &state,
            CreateRoomRequest {
                player_id: Uuid::new_v4(),
                player_name: "Ada".to_string(),
                avatar: None,
                room_name: None,
                visibility: Some(Visibility::Public),
            },
        )
        .await
        .unwrap();

        assert_eq!(code.as_str().len(), CODE_LENGTH);
        assert_eq!(snapshot.name, "Ada's room");

        let store = state.require_store().await.unwrap();
        let entries = store.list_index_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].code, code);
    }

    #[tokio::test]
    async fn duplicate_connected_names_are_rejected_case_insensitively() {
        let state = fresh_state().await;
        let code = RoomCode::new("NAME");
        join_room(&state, &code, join("Ada")).await.unwrap();

        let err = join_room(&state, &code, join("ADA")).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn locked_room_rejects_newcomers_but_readmits_members() {
        let state = fresh_state().await;
        let code = RoomCode::new("LOCK");
        let owner = join("Ada");
        let owner_id = owner.player_id;
        join_room(&state, &code, owner).await.unwrap();
        let member = join("Brin");
        let member_id = member.player_id;
        join_room(&state, &code, member).await.unwrap();

        set_locked(
            &state,
            &code,
            SetLockedRequest {
                player_id: owner_id,
                locked: true,
            },
        )
        .await
        .unwrap();

        let err = join_room(&state, &code, join("Cleo")).await.unwrap_err();
        assert!(matches!(err, GameError::RoomLocked));

        leave_room(&state, &code, &member_id).await.unwrap();
        let rejoin = JoinRoomRequest {
            player_id: member_id,
            name: "Brin".to_string(),
            avatar: None,
            visibility: None,
        };
        let snapshot = join_room(&state, &code, rejoin).await.unwrap();
        assert!(
            snapshot
                .players
                .iter()
                .find(|p| p.id == member_id)
                .unwrap()
                .connected
        );
    }

    #[tokio::test]
    async fn capacity_is_enforced_for_new_players() {
        let state = fresh_state().await;
        let code = RoomCode::new("FULL");
        join_room(&state, &code, join("Ada")).await.unwrap();

        let store = state.require_store().await.unwrap();
        let (revision, mut room) = store.read_room(&code).await.unwrap().unwrap();
        room.capacity = 1;
        store.swap_room(&code, revision, room).await.unwrap();

        let err = join_room(&state, &code, join("Brin")).await.unwrap_err();
        assert!(matches!(err, GameError::RoomFull));
    }

    #[tokio::test]
    async fn last_leaver_deletes_the_room_and_its_listing() {
        let state = fresh_state().await;
        let code = RoomCode::new("BYEE");
        let request = JoinRoomRequest {
            visibility: Some(Visibility::Public),
            ..join("Ada")
        };
        let owner_id = request.player_id;
        join_room(&state, &code, request).await.unwrap();

        leave_room(&state, &code, &owner_id).await.unwrap();

        let store = state.require_store().await.unwrap();
        assert!(store.read_room(&code).await.unwrap().is_none());
        assert!(store.list_index_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn leaving_owner_hands_the_room_over_immediately() {
        let state = fresh_state().await;
        let code = RoomCode::new("HAND");
        let owner = join("Ada");
        let owner_id = owner.player_id;
        join_room(&state, &code, owner).await.unwrap();
        let member = join("Brin");
        let member_id = member.player_id;
        join_room(&state, &code, member).await.unwrap();

        leave_room(&state, &code, &owner_id).await.unwrap();

        let store = state.require_store().await.unwrap();
        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        assert_eq!(room.owner_id, member_id);
    }

    #[tokio::test]
    async fn kick_bans_and_removes_the_target() {
        let state = fresh_state().await;
        let code = RoomCode::new("KICK");
        let owner = join("Ada");
        let owner_id = owner.player_id;
        join_room(&state, &code, owner).await.unwrap();
        let target = join("Brin");
        let target_id = target.player_id;
        join_room(&state, &code, target).await.unwrap();

        let snapshot = kick_player(
            &state,
            &code,
            KickPlayerRequest {
                player_id: owner_id,
                target_id,
            },
        )
        .await
        .unwrap();
        assert_eq!(snapshot.players.len(), 1);

        // The ban keeps the kicked player out until it expires.
        let rejoin = JoinRoomRequest {
            player_id: target_id,
            name: "Brin".to_string(),
            avatar: None,
            visibility: None,
        };
        let err = join_room(&state, &code, rejoin).await.unwrap_err();
        assert!(matches!(err, GameError::Banned { .. }));
    }

    #[tokio::test]
    async fn self_kick_is_forbidden() {
        let state = fresh_state().await;
        let code = RoomCode::new("SELF");
        let owner = join("Ada");
        let owner_id = owner.player_id;
        join_room(&state, &code, owner).await.unwrap();

        let err = kick_player(
            &state,
            &code,
            KickPlayerRequest {
                player_id: owner_id,
                target_id: owner_id,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GameError::Forbidden(_)));
    }

    #[tokio::test]
    async fn word_settings_freeze_once_the_game_starts() {
        use crate::dao::models::Role;

        let state = fresh_state().await;
        let code = RoomCode::new("FRZE");
        let owner = join("Ada");
        let owner_id = owner.player_id;
        join_room(&state, &code, owner).await.unwrap();
        for name in ["Brin", "Cleo", "Dana"] {
            join_room(&state, &code, join(name)).await.unwrap();
        }

        let store = state.require_store().await.unwrap();
        let (revision, mut room) = store.read_room(&code).await.unwrap().unwrap();
        let ids: Vec<Uuid> = room.players.keys().copied().collect();
        room.assign_role(&ids[0], Some(Team::Red), Some(Role::ClueGiver))
            .unwrap();
        room.assign_role(&ids[1], Some(Team::Red), Some(Role::Guesser))
            .unwrap();
        room.assign_role(&ids[2], Some(Team::Blue), Some(Role::ClueGiver))
            .unwrap();
        room.assign_role(&ids[3], Some(Team::Blue), Some(Role::Guesser))
            .unwrap();
        store.swap_room(&code, revision, room).await.unwrap();

        crate::services::game_service::start_game(&state, &code, &owner_id)
            .await
            .unwrap();

        let err = set_word_packs(
            &state,
            &code,
            SetWordPacksRequest {
                player_id: owner_id,
                packs: vec!["science".to_string()],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));

        let err = set_custom_words(
            &state,
            &code,
            SetCustomWordsRequest {
                player_id: owner_id,
                words: vec!["kelp".to_string()],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
    }

    #[tokio::test]
    async fn settings_require_the_owner() {
        let state = fresh_state().await;
        let code = RoomCode::new("OWNS");
        join_room(&state, &code, join("Ada")).await.unwrap();
        let member = join("Brin");
        let member_id = member.player_id;
        join_room(&state, &code, member).await.unwrap();

        let err = set_room_name(
            &state,
            &code,
            SetRoomNameRequest {
                player_id: member_id,
                name: "Renamed".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GameError::NotOwner));
    }

    #[tokio::test]
    async fn heartbeat_reconnects_a_dropped_player() {
        let state = fresh_state().await;
        let code = RoomCode::new("BEAT");
        let request = join("Ada");
        let player_id = request.player_id;
        join_room(&state, &code, request).await.unwrap();

        let store = state.require_store().await.unwrap();
        let (revision, mut room) = store.read_room(&code).await.unwrap().unwrap();
        room.player_mut(&player_id).unwrap().connected = false;
        store.swap_room(&code, revision, room).await.unwrap();

        heartbeat(&state, &code, &player_id).await.unwrap();

        let (_, room) = store.read_room(&code).await.unwrap().unwrap();
        assert!(room.player(&player_id).unwrap().connected);
        assert!(state.presence().last_seen(&code, player_id).is_some());
    }
}
