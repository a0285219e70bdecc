//! Team and role assignment: the lobby self-service regime, the owner's
//! mid-game substitutions, and the randomized team split.

use rand::{rng, seq::SliceRandom};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::{Role, RoomCode, Team},
    dto::{game::SetRoleRequest, snapshot::RoomSnapshot},
    error::GameError,
    services::{TxDecision, mutate_room},
    state::{SharedState, room::Room},
};

/// Fewest players a randomized split accepts.
const MIN_PLAYERS_FOR_SPLIT: usize = 4;

/// Assign or clear a team and role.
///
/// Outside active play anyone may reseat themselves and the owner may
/// reseat anyone. During active play only the owner may act, only to pull
/// a spectator in, and only as a guesser; the clue-giver seat never changes
/// mid-turn.
pub async fn set_lobby_role(
    state: &SharedState,
    code: &RoomCode,
    request: SetRoleRequest,
) -> Result<RoomSnapshot, GameError> {
    let store = state.require_store().await?;
    let target = request.target_id.unwrap_or(request.player_id);

    let (_, room) = mutate_room(&store, code, |room| {
        room.require_player(&request.player_id)?;
        room.require_player(&target)?;

        if room.phase.is_active() {
            room.require_owner(&request.player_id)?;
            require_spectator_substitution(room, &target, request.team, request.role)?;
        } else if target != request.player_id {
            room.require_owner(&request.player_id)?;
        }

        room.assign_role(&target, request.team, request.role)?;
        Ok(TxDecision::Commit(()))
    })
    .await?;

    debug!(
        code = %code,
        target = %target,
        team = ?request.team,
        role = ?request.role,
        "role assigned"
    );
    Ok(RoomSnapshot::from(&room))
}

/// Shuffle every player into two staffed teams. Owner-only; rejected during
/// active play and below [`MIN_PLAYERS_FOR_SPLIT`] players. The odd player
/// lands on red, and the first player of each half takes the clue-giver
/// seat.
pub async fn randomize_teams(
    state: &SharedState,
    code: &RoomCode,
    player_id: &Uuid,
) -> Result<RoomSnapshot, GameError> {
    let store = state.require_store().await?;

    let (_, room) = mutate_room(&store, code, |room| {
        room.require_owner(player_id)?;
        if room.phase.is_active() {
            return Err(GameError::InvalidState(
                "teams cannot be shuffled while a game is in progress".to_string(),
            ));
        }
        if room.players.len() < MIN_PLAYERS_FOR_SPLIT {
            return Err(GameError::InvalidState(format!(
                "at least {MIN_PLAYERS_FOR_SPLIT} players are needed to split teams"
            )));
        }

        let mut ids: Vec<Uuid> = room.players.keys().copied().collect();
        ids.shuffle(&mut rng());
        let red_size = ids.len().div_ceil(2);

        // Clear all seats first so clue-giver uniqueness cannot trip over
        // the previous layout.
        for id in &ids {
            room.demote(id);
        }
        for (n, id) in ids.iter().enumerate() {
            let team = if n < red_size { Team::Red } else { Team::Blue };
            let role = if n == 0 || n == red_size {
                Role::ClueGiver
            } else {
                Role::Guesser
            };
            room.assign_role(id, Some(team), Some(role))?;
        }
        Ok(TxDecision::Commit(()))
    })
    .await?;

    info!(code = %code, players = room.players.len(), "teams randomized");
    Ok(RoomSnapshot::from(&room))
}

fn require_spectator_substitution(
    room: &Room,
    target: &Uuid,
    team: Option<Team>,
    role: Option<Role>,
) -> Result<(), GameError> {
    let player = room.require_player(target)?;
    if player.team.is_some() {
        return Err(GameError::InvalidState(
            "only spectators can be seated during play".to_string(),
        ));
    }
    if team.is_none() || role != Some(Role::Guesser) {
        return Err(GameError::InvalidState(
            "mid-game substitutions may only add a guesser".to_string(),
        ));
    }
    Ok(())
}
