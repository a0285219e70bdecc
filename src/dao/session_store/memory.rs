//! In-process session store. The reference backend: every mutation is a
//! straight map update under the shard lock, revisions are a per-room
//! counter, and change signals fan out over broadcast channels.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::models::{MessageDoc, MessageKind, PublicRoomEntry, RoomCode};
use crate::dao::session_store::{IndexSignal, Revision, RoomSignal, SessionStore, SwapOutcome};
use crate::dao::storage::StoreResult;
use crate::state::room::Room;

/// Signals buffered per subscriber before lagging kicks in.
const SIGNAL_BUFFER: usize = 64;

#[derive(Debug)]
struct RoomSlot {
    seq: u64,
    room: Room,
}

struct MemoryInner {
    rooms: DashMap<RoomCode, RoomSlot>,
    messages: DashMap<RoomCode, Vec<MessageDoc>>,
    index: DashMap<RoomCode, PublicRoomEntry>,
    room_signals: DashMap<RoomCode, broadcast::Sender<RoomSignal>>,
    index_signals: broadcast::Sender<IndexSignal>,
    skew_ms: AtomicI64,
}

/// In-memory [`SessionStore`] backend.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Build an empty store.
    pub fn new() -> Self {
        let (index_signals, _) = broadcast::channel(SIGNAL_BUFFER);
        Self {
            inner: Arc::new(MemoryInner {
                rooms: DashMap::new(),
                messages: DashMap::new(),
                index: DashMap::new(),
                room_signals: DashMap::new(),
                index_signals,
                skew_ms: AtomicI64::new(0),
            }),
        }
    }

    /// Shift the store clock forward, on top of any configured skew.
    pub fn advance(&self, ms: u64) {
        self.inner.skew_ms.fetch_add(ms as i64, Ordering::Relaxed);
    }

    fn signal(&self, code: &RoomCode, signal: RoomSignal) {
        if let Some(sender) = self.inner.room_signals.get(code) {
            let _ = sender.send(signal);
        }
    }

    fn signal_index(&self) {
        let _ = self.inner.index_signals.send(IndexSignal::Changed);
    }
}

impl SessionStore for MemoryStore {
    fn insert_room(&self, room: Room) -> BoxFuture<'static, StoreResult<SwapOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            let code = room.code.clone();
            let outcome = match store.inner.rooms.entry(code.clone()) {
                dashmap::Entry::Occupied(_) => SwapOutcome::Conflict,
                dashmap::Entry::Vacant(vacant) => {
                    vacant.insert(RoomSlot { seq: 1, room });
                    SwapOutcome::Committed(Revision("1".to_string()))
                }
            };
            if matches!(outcome, SwapOutcome::Committed(_)) {
                store.signal(&code, RoomSignal::Changed);
            }
            Ok(outcome)
        })
    }

    fn read_room(
        &self,
        code: &RoomCode,
    ) -> BoxFuture<'static, StoreResult<Option<(Revision, Room)>>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .rooms
                .get(&code)
                .map(|slot| (Revision(slot.seq.to_string()), slot.room.clone())))
        })
    }

    fn swap_room(
        &self,
        code: &RoomCode,
        expected: Revision,
        room: Room,
    ) -> BoxFuture<'static, StoreResult<SwapOutcome>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let outcome = match store.inner.rooms.get_mut(&code) {
                None => SwapOutcome::Missing,
                Some(mut slot) => {
                    if slot.seq.to_string() != expected.0 {
                        SwapOutcome::Conflict
                    } else {
                        slot.seq += 1;
                        slot.room = room;
                        SwapOutcome::Committed(Revision(slot.seq.to_string()))
                    }
                }
            };
            if matches!(outcome, SwapOutcome::Committed(_)) {
                store.signal(&code, RoomSignal::Changed);
            }
            Ok(outcome)
        })
    }

    fn delete_room(&self, code: &RoomCode) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            store.inner.rooms.remove(&code);
            store.inner.messages.remove(&code);
            if store.inner.index.remove(&code).is_some() {
                store.signal_index();
            }
            store.signal(&code, RoomSignal::Deleted);
            // Dropping the sender closes subscriber streams after the
            // buffered Deleted signal is drained.
            store.inner.room_signals.remove(&code);
            Ok(())
        })
    }

    fn list_room_codes(&self) -> BoxFuture<'static, StoreResult<Vec<RoomCode>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .rooms
                .iter()
                .map(|entry| entry.key().clone())
                .collect())
        })
    }

    fn append_message(
        &self,
        code: &RoomCode,
        message: MessageDoc,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            store
                .inner
                .messages
                .entry(code.clone())
                .or_default()
                .push(message.clone());
            store.signal(&code, RoomSignal::MessageAppended(message));
            Ok(())
        })
    }

    fn list_messages(&self, code: &RoomCode) -> BoxFuture<'static, StoreResult<Vec<MessageDoc>>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .messages
                .get(&code)
                .map(|log| log.value().clone())
                .unwrap_or_default())
        })
    }

    fn remove_messages(
        &self,
        code: &RoomCode,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let mut removed = Vec::new();
            if let Some(mut log) = store.inner.messages.get_mut(&code) {
                log.retain(|message| {
                    if ids.contains(&message.id) {
                        removed.push(message.id);
                        false
                    } else {
                        true
                    }
                });
            }
            if !removed.is_empty() {
                store.signal(&code, RoomSignal::MessagesRemoved(removed));
            }
            Ok(())
        })
    }

    fn remove_messages_of_kinds(
        &self,
        code: &RoomCode,
        kinds: Vec<MessageKind>,
    ) -> BoxFuture<'static, StoreResult<Vec<Uuid>>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let mut removed = Vec::new();
            if let Some(mut log) = store.inner.messages.get_mut(&code) {
                log.retain(|message| {
                    if kinds.contains(&message.kind) {
                        removed.push(message.id);
                        false
                    } else {
                        true
                    }
                });
            }
            if !removed.is_empty() {
                store.signal(&code, RoomSignal::MessagesRemoved(removed.clone()));
            }
            Ok(removed)
        })
    }

    fn set_reaction(
        &self,
        code: &RoomCode,
        message_id: Uuid,
        emoji: String,
        player_id: Uuid,
        present: bool,
    ) -> BoxFuture<'static, StoreResult<bool>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            let updated = match store.inner.messages.get_mut(&code) {
                Some(mut log) => match log.iter_mut().find(|m| m.id == message_id) {
                    Some(message) => {
                        if present {
                            message.reactions.entry(emoji).or_default().insert(player_id);
                        } else if let Some(reactors) = message.reactions.get_mut(&emoji) {
                            reactors.remove(&player_id);
                            if reactors.is_empty() {
                                message.reactions.remove(&emoji);
                            }
                        }
                        Some(message.clone())
                    }
                    None => None,
                },
                None => None,
            };

            match updated {
                Some(message) => {
                    store.signal(&code, RoomSignal::MessageUpdated(message));
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn put_index_entry(&self, entry: PublicRoomEntry) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.index.insert(entry.code.clone(), entry);
            store.signal_index();
            Ok(())
        })
    }

    fn delete_index_entry(&self, code: &RoomCode) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        let code = code.clone();
        Box::pin(async move {
            if store.inner.index.remove(&code).is_some() {
                store.signal_index();
            }
            Ok(())
        })
    }

    fn list_index_entries(&self) -> BoxFuture<'static, StoreResult<Vec<PublicRoomEntry>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .index
                .iter()
                .map(|entry| entry.value().clone())
                .collect())
        })
    }

    fn subscribe_room(&self, code: &RoomCode) -> broadcast::Receiver<RoomSignal> {
        self.inner
            .room_signals
            .entry(code.clone())
            .or_insert_with(|| broadcast::channel(SIGNAL_BUFFER).0)
            .subscribe()
    }

    fn subscribe_index(&self) -> broadcast::Receiver<IndexSignal> {
        self.inner.index_signals.subscribe()
    }

    fn now_ms(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        wall.saturating_add(self.inner.skew_ms.load(Ordering::Relaxed))
            .max(0) as u64
    }

    fn set_clock_skew(&self, offset_ms: i64) {
        self.inner.skew_ms.store(offset_ms, Ordering::Relaxed);
    }

    fn health_check(&self) -> BoxFuture<'static, StoreResult<()>> {
        Box::pin(async move { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StoreResult<()>> {
        Box::pin(async move { Ok(()) })
    }
}
