//! End-to-end match against the in-memory store: room creation, seating,
//! a full turn of clue/vote/reveal, the trap ending, and the rematch.

use std::sync::Arc;

use uuid::Uuid;

use cluegrid_back::{
    config::AppConfig,
    dao::models::{CardKind, Role, RoomCode, Team, Visibility},
    dao::session_store::{SessionStore, memory::MemoryStore},
    dto::{
        chat::{ReactionRequest, SendMessageRequest},
        game::{CardActionRequest, GiveClueRequest, SetRoleRequest},
        rooms::{CreateRoomRequest, JoinRoomRequest},
    },
    error::GameError,
    services::{chat_service, game_service, lobby_service, room_service, team_service, turn_service},
    state::{AppState, SharedState, phase::RoomPhase},
};

async fn fresh_state() -> SharedState {
    let state = AppState::new(AppConfig::default());
    state
        .install_session_store(Arc::new(MemoryStore::new()) as Arc<dyn SessionStore>)
        .await;
    state
}

fn join(player_id: Uuid, name: &str) -> JoinRoomRequest {
    JoinRoomRequest {
        player_id,
        name: name.to_string(),
        avatar: None,
        visibility: None,
    }
}

fn seat(owner: Uuid, target: Uuid, team: Team, role: Role) -> SetRoleRequest {
    SetRoleRequest {
        player_id: owner,
        target_id: Some(target),
        team: Some(team),
        role: Some(role),
    }
}

/// Room with four joined players seated two per team, owner as red
/// clue-giver, built through the public service surface only.
async fn seated_room(state: &SharedState) -> (RoomCode, Vec<Uuid>) {
    let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

    let (code, snapshot) = room_service::create_room(
        state,
        CreateRoomRequest {
            player_id: ids[0],
            player_name: "Avery".to_string(),
            avatar: None,
            room_name: Some("Friday night".to_string()),
            visibility: Some(Visibility::Public),
        },
    )
    .await
    .unwrap();
    assert_eq!(snapshot.owner_id, ids[0]);

    for (id, name) in ids[1..].iter().zip(["Blake", "Casey", "Drew"]) {
        room_service::join_room(state, &code, join(*id, name))
            .await
            .unwrap();
    }

    team_service::set_lobby_role(state, &code, seat(ids[0], ids[0], Team::Red, Role::ClueGiver))
        .await
        .unwrap();
    team_service::set_lobby_role(state, &code, seat(ids[0], ids[1], Team::Red, Role::Guesser))
        .await
        .unwrap();
    team_service::set_lobby_role(state, &code, seat(ids[0], ids[2], Team::Blue, Role::ClueGiver))
        .await
        .unwrap();
    team_service::set_lobby_role(state, &code, seat(ids[0], ids[3], Team::Blue, Role::Guesser))
        .await
        .unwrap();

    (code, ids)
}

/// Clue-giver and guesser ids for the team whose turn it is.
fn playing_pair(ids: &[Uuid], team: Team) -> (Uuid, Uuid) {
    match team {
        Team::Red => (ids[0], ids[1]),
        Team::Blue => (ids[2], ids[3]),
    }
}

async fn board_index(
    state: &SharedState,
    code: &RoomCode,
    kind: CardKind,
) -> usize {
    let store = state.require_store().await.unwrap();
    let (_, room) = store.read_room(code).await.unwrap().unwrap();
    room.board
        .iter()
        .position(|card| card.kind == kind && !card.revealed)
        .unwrap()
}

#[tokio::test]
async fn full_match_through_clue_vote_reveal_and_rematch() {
    let state = fresh_state().await;
    let (code, ids) = seated_room(&state).await;

    let room = game_service::start_game(&state, &code, &ids[0])
        .await
        .unwrap();
    assert_eq!(room.phase, RoomPhase::Active);
    assert_eq!(room.board.len(), 25);

    let team = room.current_team;
    let (giver, guesser) = playing_pair(&ids, team);
    let own_kind = match team {
        Team::Red => CardKind::Red,
        Team::Blue => CardKind::Blue,
    };

    // The pack words are real words, so this clue is never on the board.
    let room = turn_service::give_clue(
        &state,
        &code,
        GiveClueRequest {
            player_id: giver,
            word: "qxqxqx".to_string(),
            count: 2,
        },
    )
    .await
    .unwrap();
    assert_eq!(room.guesses_left, Some(3));
    assert_eq!(room.clue.as_ref().unwrap().word, "QXQXQX");

    // A correct guess keeps the turn and burns one guess.
    let index = board_index(&state, &code, own_kind).await;
    let vote = turn_service::vote_card(
        &state,
        &code,
        CardActionRequest {
            player_id: guesser,
            card: index,
        },
    )
    .await
    .unwrap();
    assert!(vote.voted);

    let reveal = turn_service::confirm_reveal(
        &state,
        &code,
        CardActionRequest {
            player_id: guesser,
            card: index,
        },
    )
    .await
    .unwrap();
    assert_eq!(reveal.kind, own_kind);
    assert!(!reveal.game_over);
    assert!(!reveal.turn_passed);
    assert_eq!(reveal.guesses_left, Some(2));

    // Hitting the trap hands the match to the other team.
    let trap = board_index(&state, &code, CardKind::Trap).await;
    turn_service::vote_card(
        &state,
        &code,
        CardActionRequest {
            player_id: guesser,
            card: trap,
        },
    )
    .await
    .unwrap();
    let reveal = turn_service::confirm_reveal(
        &state,
        &code,
        CardActionRequest {
            player_id: guesser,
            card: trap,
        },
    )
    .await
    .unwrap();
    assert!(reveal.game_over);
    assert_eq!(reveal.winner, Some(team.opposing()));

    let store = state.require_store().await.unwrap();
    let (_, room) = store.read_room(&code).await.unwrap().unwrap();
    assert_eq!(
        room.phase,
        RoomPhase::GameOver {
            winner: team.opposing()
        }
    );
    let seats: Vec<_> = room
        .players
        .iter()
        .map(|(id, p)| (*id, p.team, p.role))
        .collect();

    // A rematch deals a fresh board with every card face down, keeping
    // everyone in the seat they held.
    let room = game_service::rematch(&state, &code, &ids[0]).await.unwrap();
    assert_eq!(room.phase, RoomPhase::Active);
    assert_eq!(room.board.len(), 25);
    assert!(room.board.iter().all(|card| !card.revealed));
    for (id, team, role) in seats {
        let player = room.player(&id).unwrap();
        assert_eq!(player.team, team);
        assert_eq!(player.role, role);
    }
}

#[tokio::test]
async fn chat_rides_along_and_reactions_toggle() {
    let state = fresh_state().await;
    let (code, ids) = seated_room(&state).await;

    let message = chat_service::send_message(
        &state,
        &code,
        SendMessageRequest {
            player_id: ids[1],
            body: "good luck everyone".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(message.player_name.as_deref(), Some("Blake"));

    let reaction = ReactionRequest {
        player_id: ids[2],
        emoji: "🎉".to_string(),
    };
    let changed = chat_service::set_reaction(&state, &code, message.id, reaction, true)
        .await
        .unwrap();
    assert!(changed);

    // Setting the same reaction again is a no-op.
    let reaction = ReactionRequest {
        player_id: ids[2],
        emoji: "🎉".to_string(),
    };
    let changed = chat_service::set_reaction(&state, &code, message.id, reaction, true)
        .await
        .unwrap();
    assert!(!changed);

    let messages = chat_service::list_messages(&state, &code).await.unwrap();
    let entry = messages.iter().find(|m| m.id == message.id).unwrap();
    assert_eq!(entry.reactions["🎉"], vec![ids[2]]);
}

#[tokio::test]
async fn public_room_shows_up_in_discovery() {
    let state = fresh_state().await;
    let (code, _) = seated_room(&state).await;

    let listed = lobby_service::get_public_rooms(&state).await.unwrap();
    let entry = listed
        .rooms
        .iter()
        .find(|room| room.code == code.as_str())
        .expect("public room listed");
    assert_eq!(entry.name, "Friday night");
    assert_eq!(entry.connected_players, 4);
}

#[tokio::test]
async fn first_join_claims_an_unclaimed_code() {
    let state = fresh_state().await;
    let code = RoomCode::new("FLOW");
    let founder = Uuid::new_v4();

    let snapshot = room_service::join_room(&state, &code, join(founder, "Avery"))
        .await
        .unwrap();
    assert_eq!(snapshot.owner_id, founder);
    assert_eq!(snapshot.code, "FLOW");
    assert_eq!(snapshot.phase, RoomPhase::Lobby);

    // The founder's room name follows their player name.
    assert_eq!(snapshot.name, "Avery's room");
}

#[tokio::test]
async fn without_a_store_every_operation_degrades() {
    let state = AppState::new(AppConfig::default());
    let code = RoomCode::new("DEGR");

    let err = room_service::join_room(&state, &code, join(Uuid::new_v4(), "Avery"))
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Degraded));
}
