use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Health payload for the `/healthcheck` route, with the stored room count
/// while the backend is reachable.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Ok(store) = state.require_store().await else {
        warn!("session store unavailable (degraded mode)");
        return HealthResponse::degraded();
    };

    if let Err(err) = store.health_check().await {
        warn!(error = %err, "storage health check failed");
        return HealthResponse::degraded();
    }

    match store.list_room_codes().await {
        Ok(codes) => HealthResponse::ok(codes.len()),
        Err(err) => {
            warn!(error = %err, "room count query failed");
            HealthResponse::degraded()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::models::{RoomCode, Team, Visibility},
        dao::session_store::{SessionStore, memory::MemoryStore},
        state::{AppState, room::Room},
    };

    #[tokio::test]
    async fn reports_room_count_when_healthy() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let room = Room::new(
            RoomCode::new("OKAY"),
            "Health".to_string(),
            Uuid::new_v4(),
            Visibility::Private,
            8,
            Team::Red,
            0,
        );
        store.insert_room(room).await.unwrap();

        let state = AppState::shared_for_tests(store);
        let response = health_status(&state).await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.rooms, Some(1));
    }

    #[tokio::test]
    async fn degraded_without_a_store() {
        let state = AppState::new(AppConfig::default());
        let response = health_status(&state).await;
        assert_eq!(response.status, "degraded");
        assert_eq!(response.rooms, None);
    }
}
