pub mod phase;
pub mod presence;
pub mod room;
pub mod timers;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig, dao::session_store::SessionStore, error::GameError, words::WordCatalog,
};

pub use self::presence::PresenceTracker;
pub use self::timers::RoomTimers;

pub type SharedState = Arc<AppState>;

/// Central application state storing the session store handle and the
/// registries shared by every request and background task.
pub struct AppState {
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    config: AppConfig,
    words: WordCatalog,
    presence: PresenceTracker,
    timers: RoomTimers,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let mut words = WordCatalog::builtin();
        for (id, pack) in &config.extra_packs {
            words.add_pack(id, pack.iter().cloned());
        }

        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            session_store: RwLock::new(None),
            config,
            words,
            presence: PresenceTracker::new(),
            timers: RoomTimers::new(),
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Session store handle, or the typed failure every gameplay path maps to 503.
    pub async fn require_store(&self) -> Result<Arc<dyn SessionStore>, GameError> {
        self.session_store().await.ok_or(GameError::Degraded)
    }

    /// Install a new session store implementation and leave degraded mode.
    pub async fn install_session_store(&self, store: Arc<dyn SessionStore>) {
        {
            let mut guard = self.session_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current session store and enter degraded mode.
    pub async fn clear_session_store(&self) {
        {
            let mut guard = self.session_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.session_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Word catalog used for board generation.
    pub fn words(&self) -> &WordCatalog {
        &self.words
    }

    /// Volatile heartbeat table.
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Background task registries.
    pub fn timers(&self) -> &RoomTimers {
        &self.timers
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        if *self.degraded.borrow() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }
}

#[cfg(test)]
impl AppState {
    /// State with a store already installed, for service-level tests.
    pub(crate) fn shared_for_tests(store: Arc<dyn SessionStore>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            session_store: RwLock::new(Some(store)),
            config: AppConfig::default(),
            words: WordCatalog::builtin(),
            presence: PresenceTracker::new(),
            timers: RoomTimers::new(),
            degraded: degraded_tx,
        })
    }
}
