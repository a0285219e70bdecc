//! Maintenance of the public room discovery index and the lobby browser
//! queries built on top of it.

use std::sync::Arc;

use tracing::warn;

use crate::{
    dao::{
        models::{PublicRoomEntry, RoomCode},
        session_store::SessionStore,
    },
    dto::rooms::PublicRoomsResponse,
    error::GameError,
    state::{SharedState, room::Room},
};

/// Build the discovery entry for a room, or `None` when the room must not
/// be listed (private, or locked against new joins).
pub fn index_entry_for(room: &Room) -> Option<PublicRoomEntry> {
    if !room.visibility.is_public() || room.locked {
        return None;
    }

    let owner_name = room
        .player(&room.owner_id)
        .map(|owner| owner.name.clone())
        .unwrap_or_default();

    Some(PublicRoomEntry {
        code: room.code.clone(),
        name: room.name.clone(),
        owner_name,
        connected_players: room.connected_count(),
        capacity: room.capacity,
        status: room.phase.status(),
        timer_secs: room.timer_secs,
        created_at: room.created_at,
    })
}

/// Bring the discovery index in line with the room's current state.
///
/// Index writes are best effort: a failure here must never undo the room
/// mutation that triggered it, so errors are logged and swallowed.
pub async fn sync_index(store: &Arc<dyn SessionStore>, room: &Room) {
    let result = match index_entry_for(room) {
        Some(entry) => store.put_index_entry(entry).await,
        None => store.delete_index_entry(&room.code).await,
    };

    if let Err(err) = result {
        warn!(code = %room.code, error = %err, "discovery index update failed");
    }
}

/// Drop a room's discovery entry by code, for teardown paths where the room
/// document is already gone.
pub async fn remove_index(store: &Arc<dyn SessionStore>, code: &RoomCode) {
    if let Err(err) = store.delete_index_entry(code).await {
        warn!(code = %code, error = %err, "discovery index removal failed");
    }
}

/// List every discoverable room, most populated first.
pub async fn get_public_rooms(state: &SharedState) -> Result<PublicRoomsResponse, GameError> {
    let store = state.require_store().await?;
    let mut entries = store.list_index_entries().await?;
    entries.sort_by(|a, b| {
        b.connected_players
            .cmp(&a.connected_players)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });

    Ok(PublicRoomsResponse {
        rooms: entries.into_iter().map(Into::into).collect(),
    })
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        dao::models::{RoomCode, RoomStatus, Team, Visibility},
        dao::session_store::memory::MemoryStore,
        state::room::Player,
    };

    fn public_room(code: &str, connected: usize, now: u64) -> Room {
        let owner_id = Uuid::new_v4();
        let mut room = Room::new(
            RoomCode::new(code),
            format!("{code} room"),
            owner_id,
            Visibility::Public,
            8,
            Team::Red,
            now,
        );
        room.players
            .insert(owner_id, Player::new("Owner".to_string(), None, now));
        for n in 1..connected {
            room.players.insert(
                Uuid::new_v4(),
                Player::new(format!("Player {n}"), None, now),
            );
        }
        room
    }

    #[test]
    fn private_and_locked_rooms_are_not_listed() {
        let mut room = public_room("AAAA", 2, 10);
        assert!(index_entry_for(&room).is_some());

        room.locked = true;
        assert!(index_entry_for(&room).is_none());

        room.locked = false;
        room.visibility = Visibility::Private;
        assert!(index_entry_for(&room).is_none());
    }

    #[test]
    fn entry_reflects_connection_counts_and_status() {
        let mut room = public_room("BBBB", 3, 10);
        for player in room.players.values_mut().skip(2) {
            player.connected = false;
        }

        let entry = index_entry_for(&room).unwrap();
        assert_eq!(entry.connected_players, 2);
        assert_eq!(entry.status, RoomStatus::Lobby);
        assert_eq!(entry.owner_name, "Owner");
    }

    #[tokio::test]
    async fn public_rooms_sorted_by_population() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        for (code, connected) in [("ONE", 1), ("THREE", 3), ("TWO", 2)] {
            let room = public_room(code, connected, 10);
            sync_index(&store, &room).await;
        }

        let state = crate::state::AppState::shared_for_tests(store);
        let listed = get_public_rooms(&state).await.unwrap();
        let codes: Vec<_> = listed.rooms.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, ["THREE", "TWO", "ONE"]);
    }

    #[tokio::test]
    async fn remove_index_drops_the_entry_by_code() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let room = public_room("TORN", 2, 10);
        sync_index(&store, &room).await;
        assert_eq!(store.list_index_entries().await.unwrap().len(), 1);

        remove_index(&store, &room.code).await;
        assert!(store.list_index_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sync_index_delists_room_that_became_locked() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let mut room = public_room("GONE", 2, 10);
        sync_index(&store, &room).await;
        assert_eq!(store.list_index_entries().await.unwrap().len(), 1);

        room.locked = true;
        sync_index(&store, &room).await;
        assert!(store.list_index_entries().await.unwrap().is_empty());
    }
}
