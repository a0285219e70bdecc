//! Payloads carried on the per-room and lobby SSE streams.
//!
//! Every event is serialised into the SSE `data` field; the event name on
//! the wire is listed on each payload type.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// `systemStatus` event, emitted when the backend enters or leaves degraded
/// mode.
#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStatus {
    pub degraded: bool,
}

/// `messagesRemoved` event, emitted when chat entries were pruned or wiped.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessagesRemovedEvent {
    /// Ids of the removed messages.
    pub ids: Vec<Uuid>,
}

/// `roomDeleted` event, the final event a room stream emits before closing.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomDeletedEvent {
    /// Code of the room that was torn down.
    pub code: String,
}
