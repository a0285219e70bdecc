//! Server-sent event streams driven by the store's change signals: one live
//! feed per room and one feed for the lobby browser.
//!
//! Event names on the wire: `snapshot`, `message`, `messageUpdated`,
//! `messagesRemoved`, `roomDeleted`, `rooms`, and `systemStatus`.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::{Stream, StreamExt, stream};
use serde::Serialize;
use tokio_stream::wrappers::{BroadcastStream, WatchStream, errors::BroadcastStreamRecvError};
use tracing::{debug, warn};

use crate::{
    dao::{models::RoomCode, session_store::RoomSignal},
    dto::{
        snapshot::{MessageView, RoomSnapshot},
        sse::{MessagesRemovedEvent, RoomDeletedEvent, SystemStatus},
    },
    error::GameError,
    services::lobby_service,
    state::SharedState,
};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Inputs merged into one room feed.
enum RoomFeed {
    Signal(RoomSignal),
    Lagged,
    Degraded(bool),
    /// The store's signal channel closed (backend swap); the client should
    /// reconnect.
    Closed,
}

/// Inputs merged into one lobby feed.
enum LobbyFeed {
    Changed,
    Degraded(bool),
    Closed,
}

/// Open the live feed of one room.
///
/// Starts with a full `snapshot`, then follows the store's signals: fresh
/// snapshots on room changes, message events for the chat log, a final
/// `roomDeleted` before the stream closes, and `systemStatus` whenever the
/// degraded flag flips.
pub async fn room_stream(
    state: &SharedState,
    code: &RoomCode,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + use<>>, GameError> {
    let store = state.require_store().await?;
    let Some((_, room)) = store.read_room(code).await? else {
        return Err(GameError::NotFound(format!("room `{code}` not found")));
    };
    let initial = RoomSnapshot::from(room);

    let signals = BroadcastStream::new(store.subscribe_room(code))
        .map(|item| match item {
            Ok(signal) => RoomFeed::Signal(signal),
            Err(BroadcastStreamRecvError::Lagged(_)) => RoomFeed::Lagged,
        })
        .chain(stream::once(async { RoomFeed::Closed }));
    let degraded = WatchStream::from_changes(state.degraded_watcher()).map(RoomFeed::Degraded);
    let mut feed = Box::pin(stream::select(signals, degraded));
    let code = code.clone();

    let events = async_stream::stream! {
        if let Some(event) = named_event("snapshot", &initial) {
            yield Ok(event);
        }

        while let Some(item) = feed.next().await {
            match item {
                // A lagged receiver missed signals; a fresh snapshot covers
                // whatever was dropped.
                RoomFeed::Signal(RoomSignal::Changed) | RoomFeed::Lagged => {
                    match store.read_room(&code).await {
                        Ok(Some((_, room))) => {
                            if let Some(event) =
                                named_event("snapshot", &RoomSnapshot::from(room))
                            {
                                yield Ok(event);
                            }
                        }
                        Ok(None) => {
                            if let Some(event) = deleted_event(&code) {
                                yield Ok(event);
                            }
                            break;
                        }
                        Err(err) => {
                            warn!(code = %code, error = %err, "snapshot reload failed");
                        }
                    }
                }
                RoomFeed::Signal(RoomSignal::MessageAppended(doc)) => {
                    if let Some(event) = named_event("message", &MessageView::from(doc)) {
                        yield Ok(event);
                    }
                }
                RoomFeed::Signal(RoomSignal::MessageUpdated(doc)) => {
                    if let Some(event) = named_event("messageUpdated", &MessageView::from(doc)) {
                        yield Ok(event);
                    }
                }
                RoomFeed::Signal(RoomSignal::MessagesRemoved(ids)) => {
                    if let Some(event) =
                        named_event("messagesRemoved", &MessagesRemovedEvent { ids })
                    {
                        yield Ok(event);
                    }
                }
                RoomFeed::Signal(RoomSignal::Deleted) => {
                    if let Some(event) = deleted_event(&code) {
                        yield Ok(event);
                    }
                    break;
                }
                RoomFeed::Degraded(flag) => {
                    if let Some(event) = named_event("systemStatus", &SystemStatus { degraded: flag }) {
                        yield Ok(event);
                    }
                }
                RoomFeed::Closed => break,
            }
        }

        debug!(code = %code, "room stream ended");
    };

    Ok(sse_response(events))
}

/// Open the lobby browser feed: the current public room list, refreshed on
/// every discovery index change, plus `systemStatus` updates.
pub async fn lobby_stream(
    state: &SharedState,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + use<>>, GameError> {
    let store = state.require_store().await?;
    let initial = lobby_service::get_public_rooms(state).await?;

    let signals = BroadcastStream::new(store.subscribe_index())
        .map(|_| LobbyFeed::Changed)
        .chain(stream::once(async { LobbyFeed::Closed }));
    let degraded = WatchStream::from_changes(state.degraded_watcher()).map(LobbyFeed::Degraded);
    let mut feed = Box::pin(stream::select(signals, degraded));
    let state = state.clone();

    let events = async_stream::stream! {
        if let Some(event) = named_event("rooms", &initial) {
            yield Ok(event);
        }

        while let Some(item) = feed.next().await {
            match item {
                LobbyFeed::Changed => match lobby_service::get_public_rooms(&state).await {
                    Ok(rooms) => {
                        if let Some(event) = named_event("rooms", &rooms) {
                            yield Ok(event);
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "public room reload failed");
                    }
                },
                LobbyFeed::Degraded(flag) => {
                    if let Some(event) = named_event("systemStatus", &SystemStatus { degraded: flag }) {
                        yield Ok(event);
                    }
                }
                LobbyFeed::Closed => break,
            }
        }

        debug!("lobby stream ended");
    };

    Ok(sse_response(events))
}

fn sse_response<S>(stream: S) -> Sse<KeepAliveStream<S>>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

fn deleted_event(code: &RoomCode) -> Option<Event> {
    named_event(
        "roomDeleted",
        &RoomDeletedEvent {
            code: code.as_str().to_string(),
        },
    )
}

/// Serialisation failures drop the single event instead of the stream.
fn named_event<T: Serialize>(name: &str, payload: &T) -> Option<Event> {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event = name, error = %err, "event serialisation failed");
            None
        }
    }
}
