#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::models::{MessageDoc, MessageKind, PublicRoomEntry, RoomCode};
use crate::dao::storage::StoreResult;
use crate::state::room::Room;

/// Opaque document revision used for compare-and-swap room writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision(pub String);

/// Outcome of a revisioned room write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The write committed; carries the new revision.
    Committed(Revision),
    /// The expected revision was stale (or the room already exists, for
    /// inserts); reload and retry.
    Conflict,
    /// The room no longer exists.
    Missing,
}

/// Change notification fanned out to subscribers of one room.
#[derive(Debug, Clone)]
pub enum RoomSignal {
    /// The room document changed; subscribers should reload the snapshot.
    Changed,
    /// A message was appended to the log.
    MessageAppended(MessageDoc),
    /// An existing message changed (reaction updates).
    MessageUpdated(MessageDoc),
    /// Messages were removed by pruning or a game restart.
    MessagesRemoved(Vec<Uuid>),
    /// The room was deleted; the stream ends after this.
    Deleted,
}

/// Change notification for the public room index.
#[derive(Debug, Clone)]
pub enum IndexSignal {
    /// Entries were added, removed, or refreshed.
    Changed,
}

/// Abstraction over the persistence and change-signal layer for room
/// sessions, their message logs, and the public discovery index.
///
/// Room writes are revisioned: `insert_room` fails with a conflict when the
/// code is taken, and `swap_room` commits only when the caller read the
/// revision it passes back. All mutation retry loops build on those two.
pub trait SessionStore: Send + Sync {
    fn insert_room(&self, room: Room) -> BoxFuture<'static, StoreResult<SwapOutcome>>;
    fn read_room(
        &self,
        code: &RoomCode,
    ) -> BoxFuture<'static, StoreResult<Option<(Revision, Room)>>>;
    fn swap_room(
        &self,
        code: &RoomCode,
        expected: Revision,
        room: Room,
    ) -> BoxFuture<'static, StoreResult<SwapOutcome>>;
    fn delete_room(&self, code: &RoomCode) -> BoxFuture<'static, StoreResult<()>>;
    fn list_room_codes(&self) -> BoxFuture<'static, StoreResult<Vec<RoomCode>>>;

    fn append_message(
        &self,
        code: &RoomCode,
        message: MessageDoc,
    ) -> BoxFuture<'static, StoreResult<()>>;
    fn list_messages(&self, code: &RoomCode) -> BoxFuture<'static, StoreResult<Vec<MessageDoc>>>;
    fn remove_messages(
        &self,
        code: &RoomCode,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StoreResult<()>>;
    fn remove_messages_of_kinds(
        &self,
        code: &RoomCode,
        kinds: Vec<MessageKind>,
    ) -> BoxFuture<'static, StoreResult<Vec<Uuid>>>;
    fn set_reaction(
        &self,
        code: &RoomCode,
        message_id: Uuid,
        emoji: String,
        player_id: Uuid,
        present: bool,
    ) -> BoxFuture<'static, StoreResult<bool>>;

    fn put_index_entry(&self, entry: PublicRoomEntry) -> BoxFuture<'static, StoreResult<()>>;
    fn delete_index_entry(&self, code: &RoomCode) -> BoxFuture<'static, StoreResult<()>>;
    fn list_index_entries(&self) -> BoxFuture<'static, StoreResult<Vec<PublicRoomEntry>>>;

    fn subscribe_room(&self, code: &RoomCode) -> broadcast::Receiver<RoomSignal>;
    fn subscribe_index(&self) -> broadcast::Receiver<IndexSignal>;

    /// Current time in epoch milliseconds, adjusted by the configured skew.
    /// All ban expiries, heartbeats, and timer anchors use this clock.
    fn now_ms(&self) -> u64;
    /// Adjust the store clock by a signed offset.
    fn set_clock_skew(&self, offset_ms: i64);

    fn health_check(&self) -> BoxFuture<'static, StoreResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StoreResult<()>>;
}
