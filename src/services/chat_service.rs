//! Room chat: posting, reactions, the system/clue/reveal announcements the
//! game engine writes into the same log, and pruning.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{CardKind, MessageDoc, MessageKind, RoomCode, Team},
        session_store::SessionStore,
    },
    dto::{
        chat::{PrunedResponse, ReactionRequest, SendMessageRequest},
        snapshot::MessageView,
    },
    error::GameError,
    state::SharedState,
};

/// Post a chat message authored by a room member.
pub async fn send_message(
    state: &SharedState,
    code: &RoomCode,
    request: SendMessageRequest,
) -> Result<MessageView, GameError> {
    let store = state.require_store().await?;
    let Some((_, room)) = store.read_room(code).await? else {
        return Err(GameError::NotFound(format!("room `{code}` not found")));
    };
    let player = room.require_player(&request.player_id)?;

    let doc = MessageDoc {
        id: Uuid::new_v4(),
        player_id: Some(request.player_id),
        player_name: Some(player.name.clone()),
        avatar: player.avatar.clone(),
        body: request.body,
        kind: MessageKind::Chat,
        clue_team: None,
        revealed_kind: None,
        reactions: BTreeMap::new(),
        sent_at: store.now_ms(),
    };
    store.append_message(code, doc.clone()).await?;

    prune_if_needed(
        &store,
        code,
        state.config().message_prune_threshold,
        state.config().message_keep,
    )
    .await;

    Ok(doc.into())
}

/// Add or remove an emoji reaction for the acting player.
///
/// The write is a store-level toggle so two players reacting to the same
/// message at once cannot clobber each other.
pub async fn set_reaction(
    state: &SharedState,
    code: &RoomCode,
    message_id: Uuid,
    request: ReactionRequest,
    present: bool,
) -> Result<bool, GameError> {
    let store = state.require_store().await?;
    let Some((_, room)) = store.read_room(code).await? else {
        return Err(GameError::NotFound(format!("room `{code}` not found")));
    };
    room.require_player(&request.player_id)?;

    let changed = store
        .set_reaction(code, message_id, request.emoji, request.player_id, present)
        .await?;
    Ok(changed)
}

/// Full message log of a room, oldest first.
pub async fn list_messages(
    state: &SharedState,
    code: &RoomCode,
) -> Result<Vec<MessageView>, GameError> {
    let store = state.require_store().await?;
    if store.read_room(code).await?.is_none() {
        return Err(GameError::NotFound(format!("room `{code}` not found")));
    }

    let messages = store.list_messages(code).await?;
    Ok(messages.into_iter().map(Into::into).collect())
}

/// Owner-triggered prune of the oldest chat entries.
pub async fn prune_messages(
    state: &SharedState,
    code: &RoomCode,
    player_id: &Uuid,
) -> Result<PrunedResponse, GameError> {
    let store = state.require_store().await?;
    let Some((_, room)) = store.read_room(code).await? else {
        return Err(GameError::NotFound(format!("room `{code}` not found")));
    };
    room.require_owner(player_id)?;

    let pruned = prune_to_keep(&store, code, state.config().message_keep).await?;
    Ok(PrunedResponse { pruned })
}

/// Prune when the log exceeds the threshold, keeping the newest entries.
/// Failures are logged and swallowed so chat growth never fails the write
/// that triggered the check.
pub async fn prune_if_needed(
    store: &Arc<dyn SessionStore>,
    code: &RoomCode,
    threshold: usize,
    keep: usize,
) {
    let over_threshold = match store.list_messages(code).await {
        Ok(messages) => messages.len() > threshold,
        Err(err) => {
            warn!(code = %code, error = %err, "message count check failed");
            return;
        }
    };

    if !over_threshold {
        return;
    }

    if let Err(err) = prune_to_keep(store, code, keep).await {
        warn!(code = %code, error = %err, "automatic chat prune failed");
    }
}

/// Remove all but the newest `keep` messages, returning how many went.
pub async fn prune_to_keep(
    store: &Arc<dyn SessionStore>,
    code: &RoomCode,
    keep: usize,
) -> Result<usize, GameError> {
    let mut messages = store.list_messages(code).await?;
    if messages.len() <= keep {
        return Ok(0);
    }

    messages.sort_by_key(|m| m.sent_at);
    let surplus = messages.len() - keep;
    let ids: Vec<Uuid> = messages[..surplus].iter().map(|m| m.id).collect();
    store.remove_messages(code, ids.clone()).await?;

    debug!(code = %code, pruned = ids.len(), "chat log pruned");
    Ok(ids.len())
}

/// Append a room-level announcement (joins, kicks, owner changes).
pub async fn post_system(store: &Arc<dyn SessionStore>, code: &RoomCode, body: impl Into<String>) {
    post_announcement(store, code, MessageKind::System, body.into(), None, None).await;
}

/// Append a game-level announcement (start, pause, win). These are wiped
/// when the next game starts.
pub async fn post_game_system(
    store: &Arc<dyn SessionStore>,
    code: &RoomCode,
    body: impl Into<String>,
) {
    post_announcement(
        store,
        code,
        MessageKind::GameSystem,
        body.into(),
        None,
        None,
    )
    .await;
}

/// Append a clue announcement tagged with the giving team.
pub async fn post_clue(
    store: &Arc<dyn SessionStore>,
    code: &RoomCode,
    team: Team,
    word: &str,
    count: u8,
) {
    post_announcement(
        store,
        code,
        MessageKind::Clue,
        format!("{word} {count}"),
        Some(team),
        None,
    )
    .await;
}

/// Append a reveal announcement tagged with the card's affiliation.
pub async fn post_reveal(
    store: &Arc<dyn SessionStore>,
    code: &RoomCode,
    body: String,
    kind: CardKind,
) {
    post_announcement(store, code, MessageKind::Reveal, body, None, Some(kind)).await;
}

/// Remove every game-scoped entry (clues, reveals, game announcements),
/// leaving player chat and room announcements in place.
pub async fn wipe_game_messages(
    store: &Arc<dyn SessionStore>,
    code: &RoomCode,
) -> Result<Vec<Uuid>, GameError> {
    let removed = store
        .remove_messages_of_kinds(
            code,
            vec![MessageKind::Clue, MessageKind::Reveal, MessageKind::GameSystem],
        )
        .await?;
    Ok(removed)
}

/// Announcements are best effort, a failed append never fails the action
/// that produced it.
async fn post_announcement(
    store: &Arc<dyn SessionStore>,
    code: &RoomCode,
    kind: MessageKind,
    body: String,
    clue_team: Option<Team>,
    revealed_kind: Option<CardKind>,
) {
    let doc = MessageDoc {
        id: Uuid::new_v4(),
        player_id: None,
        player_name: None,
        avatar: None,
        body,
        kind,
        clue_team,
        revealed_kind,
        reactions: BTreeMap::new(),
        sent_at: store.now_ms(),
    };

    if let Err(err) = store.append_message(code, doc).await {
        warn!(code = %code, kind = ?kind, error = %err, "announcement append failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::Visibility,
        dao::session_store::memory::MemoryStore,
        state::{
            AppState,
            room::{Player, Room},
        },
    };

    async fn seeded_state() -> (SharedState, RoomCode, Uuid) {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let code = RoomCode::new("CHAT");
        let owner_id = Uuid::new_v4();
        let mut room = Room::new(
            code.clone(),
            "Chat room".to_string(),
            owner_id,
            Visibility::Private,
            8,
            Team::Red,
            store.now_ms(),
        );
        room.players
            .insert(owner_id, Player::new("Avery".to_string(), None, 0));
        store.insert_room(room).await.unwrap();

        (AppState::shared_for_tests(store), code, owner_id)
    }

    #[tokio::test]
    async fn message_requires_membership() {
        let (state, code, owner_id) = seeded_state().await;

        let sent = send_message(
            &state,
            &code,
            SendMessageRequest {
                player_id: owner_id,
                body: "hello".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(sent.player_name.as_deref(), Some("Avery"));

        let err = send_message(
            &state,
            &code,
            SendMessageRequest {
                player_id: Uuid::new_v4(),
                body: "intruder".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[tokio::test]
    async fn reaction_toggle_reports_changes() {
        let (state, code, owner_id) = seeded_state().await;
        let sent = send_message(
            &state,
            &code,
            SendMessageRequest {
                player_id: owner_id,
                body: "react to me".to_string(),
            },
        )
        .await
        .unwrap();

        let request = |emoji: &str| ReactionRequest {
            player_id: owner_id,
            emoji: emoji.to_string(),
        };

        assert!(
            set_reaction(&state, &code, sent.id, request("👍"), true)
                .await
                .unwrap()
        );
        // Re-adding the same reaction is a no-op.
        assert!(
            !set_reaction(&state, &code, sent.id, request("👍"), true)
                .await
                .unwrap()
        );
        assert!(
            set_reaction(&state, &code, sent.id, request("👍"), false)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn prune_keeps_newest_messages() {
        let (state, code, owner_id) = seeded_state().await;
        let store = state.require_store().await.unwrap();

        for n in 0..10 {
            let doc = MessageDoc {
                id: Uuid::new_v4(),
                player_id: Some(owner_id),
                player_name: Some("Avery".to_string()),
                avatar: None,
                body: format!("message {n}"),
                kind: MessageKind::Chat,
                clue_team: None,
                revealed_kind: None,
                reactions: BTreeMap::new(),
                sent_at: n,
            };
            store.append_message(&code, doc).await.unwrap();
        }

        let pruned = prune_to_keep(&store, &code, 4).await.unwrap();
        assert_eq!(pruned, 6);

        let left = store.list_messages(&code).await.unwrap();
        assert_eq!(left.len(), 4);
        assert!(left.iter().all(|m| m.sent_at >= 6));
    }

    #[tokio::test]
    async fn wipe_spares_chat_and_room_announcements() {
        let (state, code, _) = seeded_state().await;
        let store = state.require_store().await.unwrap();

        post_system(&store, &code, "Avery joined").await;
        post_game_system(&store, &code, "Game started").await;
        post_clue(&store, &code, Team::Red, "OCEAN", 2).await;
        post_reveal(&store, &code, "OCEAN was red".to_string(), CardKind::Red).await;

        let removed = wipe_game_messages(&store, &code).await.unwrap();
        assert_eq!(removed.len(), 3);

        let left = store.list_messages(&code).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].kind, MessageKind::System);
    }
}
