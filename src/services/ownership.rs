//! Owner succession. A disconnected owner keeps the seat for a grace
//! period; an explicit leave hands it over immediately.

use std::sync::Arc;

use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::{models::RoomCode, session_store::SessionStore},
    dto::rooms::OwnershipResponse,
    error::GameError,
    services::{TxDecision, chat_service, lobby_service, mutate_room},
    state::SharedState,
};

/// Hand ownership to the first connected player when the current owner is
/// gone.
///
/// Without `skip_grace` the transfer waits until the owner has been unseen
/// for the configured grace period; inside that window the remaining time
/// is returned and a retry is scheduled. `announce` posts the transfer to
/// the room log.
pub async fn reassign_owner_if_needed(
    state: &SharedState,
    code: &RoomCode,
    skip_grace: bool,
    announce: bool,
) -> Result<OwnershipResponse, GameError> {
    let store = state.require_store().await?;
    let grace_ms = state.config().owner_grace.as_millis() as u64;
    let now = store.now_ms();

    let (outcome, room) = mutate_room(&store, code, |room| {
        let owner_connected = room
            .player(&room.owner_id)
            .map(|owner| owner.connected)
            .unwrap_or(false);
        if owner_connected {
            return Ok(TxDecision::Skip(OwnershipResponse::OwnerConnected));
        }

        let Some(successor) = room.first_connected_player() else {
            return Ok(TxDecision::Skip(OwnershipResponse::NoCandidate));
        };

        if !skip_grace {
            let last_seen = room
                .player(&room.owner_id)
                .map(|owner| owner.last_seen)
                .unwrap_or(0);
            let unseen_for = now.saturating_sub(last_seen);
            if unseen_for < grace_ms {
                return Ok(TxDecision::Skip(OwnershipResponse::GracePending {
                    remaining_ms: grace_ms - unseen_for,
                }));
            }
        }

        room.owner_id = successor;
        let name = room
            .player(&successor)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        Ok(TxDecision::Commit(OwnershipResponse::Transferred {
            new_owner_id: successor,
            new_owner_name: name,
        }))
    })
    .await?;

    match &outcome {
        OwnershipResponse::Transferred { new_owner_name, .. } => {
            info!(code = %code, new_owner = %new_owner_name, "ownership transferred");
            state.timers().disarm_grace_retry(code);
            if announce {
                chat_service::post_system(
                    &store,
                    code,
                    format!("{new_owner_name} is now the room owner"),
                )
                .await;
            }
            lobby_service::sync_index(&store, &room).await;
        }
        OwnershipResponse::GracePending { remaining_ms } => {
            arm_grace_retry(state, code, *remaining_ms);
        }
        OwnershipResponse::OwnerConnected | OwnershipResponse::NoCandidate => {}
    }

    Ok(outcome)
}

/// Schedule a single retry once the grace period will have elapsed. A fresh
/// presence event replaces any retry already pending for the room.
fn arm_grace_retry(state: &SharedState, code: &RoomCode, remaining_ms: u64) {
    let buffer = state.config().timer_retry_buffer;
    let delay = Duration::from_millis(remaining_ms) + buffer;
    debug!(code = %code, delay_ms = delay.as_millis() as u64, "ownership retry scheduled");

    let task_state = state.clone();
    let task_code = code.clone();
    let handle = tokio::spawn(async move {
        sleep(delay).await;
        match reassign_owner_if_needed(&task_state, &task_code, false, true).await {
            Ok(_) => {}
            Err(GameError::NotFound(_)) => {}
            Err(err) => {
                warn!(code = %task_code, error = %err, "ownership retry failed");
            }
        }
    });

    state.timers().arm_grace_retry(code, handle);
}

/// Drop any scheduled succession retry, for when the owner comes back.
pub fn cancel_grace_retry(state: &SharedState, code: &RoomCode) {
    state.timers().disarm_grace_retry(code);
}

/// The store holding this room, plus room deletion fallout shared by leave
/// and the janitor: stop timers, forget presence, drop the index entry.
pub async fn teardown_room(
    state: &SharedState,
    store: &Arc<dyn SessionStore>,
    code: &RoomCode,
) -> Result<(), GameError> {
    store.delete_room(code).await?;
    lobby_service::remove_index(store, code).await;
    state.timers().stop_room(code);
    state.presence().forget_room(code);
    info!(code = %code, "room deleted");
    Ok(())
}
