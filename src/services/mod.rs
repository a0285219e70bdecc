//! Room mutation plumbing shared by every service.
//!
//! All room writes go through [`mutate_room`]: read the current document,
//! apply a closure to a private copy, and publish it with a revisioned swap.
//! A concurrent writer surfaces as a swap conflict and the closure simply
//! runs again on the fresh copy, so closures must stay side-effect free and
//! re-derive everything from the room they are handed.

/// Chat log operations and system message posting.
pub mod chat_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Game lifecycle transitions and automatic pausing.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Liveness sweeps and abandoned-room collection.
pub mod janitor;
/// Public room index maintenance and discovery queries.
pub mod lobby_service;
/// Owner succession rules.
pub mod ownership;
/// Room membership and settings management.
pub mod room_service;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Storage backend supervision and degraded mode.
pub mod storage_supervisor;
/// Team and role assignment.
pub mod team_service;
/// Clue, vote, reveal, and turn-expiry handling.
pub mod turn_service;

use std::sync::Arc;

use crate::{
    dao::{
        models::RoomCode,
        session_store::{SessionStore, SwapOutcome},
        storage::StoreError,
    },
    error::GameError,
    state::room::Room,
};

/// Swap retries before a mutation gives up as contended.
const MAX_SWAP_ATTEMPTS: u32 = 25;

/// What a mutation closure wants done with the room copy it just edited.
pub enum TxDecision<T> {
    /// Publish the edited room through a revisioned swap.
    Commit(T),
    /// Discard the edits; the read state already satisfied the request.
    Skip(T),
}

/// Read-modify-swap loop against a single room document.
///
/// The closure may fail with a domain error, which aborts the loop without
/// writing. On success the committed (or read, for [`TxDecision::Skip`]) room
/// is returned alongside the closure's value so callers can post messages or
/// refresh the index from the exact state that was published.
pub async fn mutate_room<T>(
    store: &Arc<dyn SessionStore>,
    code: &RoomCode,
    mut op: impl FnMut(&mut Room) -> Result<TxDecision<T>, GameError>,
) -> Result<(T, Room), GameError> {
    for _ in 0..MAX_SWAP_ATTEMPTS {
        let Some((revision, mut room)) = store.read_room(code).await? else {
            return Err(GameError::NotFound(format!("room `{}` not found", code)));
        };

        match op(&mut room)? {
            TxDecision::Skip(value) => return Ok((value, room)),
            TxDecision::Commit(value) => match store.swap_room(code, revision, room.clone()).await?
            {
                SwapOutcome::Committed(_) => return Ok((value, room)),
                SwapOutcome::Conflict => continue,
                SwapOutcome::Missing => {
                    return Err(GameError::NotFound(format!("room `{}` not found", code)));
                }
            },
        }
    }

    Err(GameError::Unavailable(StoreError::Contention {
        attempts: MAX_SWAP_ATTEMPTS,
    }))
}
