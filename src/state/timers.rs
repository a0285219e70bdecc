//! Registries for the per-room background tasks.
//!
//! Each room owns at most one armed turn-expiry task and one janitor loop.
//! Arming replaces the previous task instead of stacking a second one, and
//! every janitor carries an overlap guard so a slow sweep is skipped rather
//! than run twice concurrently.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::dao::models::RoomCode;

/// Handles to the background tasks serving live rooms.
#[derive(Debug, Default)]
pub struct RoomTimers {
    turn_deadlines: DashMap<RoomCode, JoinHandle<()>>,
    grace_retries: DashMap<RoomCode, JoinHandle<()>>,
    janitors: DashMap<RoomCode, JoinHandle<()>>,
    sweeps_running: DashMap<RoomCode, Arc<AtomicBool>>,
}

impl RoomTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a turn-expiry task, aborting whichever one was armed before.
    pub fn arm_turn_timer(&self, code: &RoomCode, task: JoinHandle<()>) {
        if let Some(previous) = self.turn_deadlines.insert(code.clone(), task) {
            previous.abort();
        }
    }

    /// Abort and forget the room's turn-expiry task, if armed.
    pub fn disarm_turn_timer(&self, code: &RoomCode) {
        if let Some((_, task)) = self.turn_deadlines.remove(code) {
            task.abort();
        }
    }

    /// Whether a turn-expiry task is currently armed for `code`.
    pub fn turn_timer_armed(&self, code: &RoomCode) -> bool {
        self.turn_deadlines.contains_key(code)
    }

    /// Install an owner-grace retry task, replacing any pending one. A fresh
    /// presence event supersedes the retry scheduled before it.
    pub fn arm_grace_retry(&self, code: &RoomCode, task: JoinHandle<()>) {
        if let Some(previous) = self.grace_retries.insert(code.clone(), task) {
            previous.abort();
        }
    }

    /// Abort and forget the room's pending owner-grace retry, if any.
    pub fn disarm_grace_retry(&self, code: &RoomCode) {
        if let Some((_, task)) = self.grace_retries.remove(code) {
            task.abort();
        }
    }

    /// Whether an owner-grace retry is currently pending for `code`.
    pub fn grace_retry_armed(&self, code: &RoomCode) -> bool {
        self.grace_retries.contains_key(code)
    }

    /// Start a janitor loop for `code` unless one is already running.
    pub fn ensure_janitor(&self, code: &RoomCode, spawn: impl FnOnce() -> JoinHandle<()>) {
        self.janitors.entry(code.clone()).or_insert_with(spawn);
    }

    /// Guard flag the room's sweep sets while it is in flight.
    pub fn sweep_guard(&self, code: &RoomCode) -> Arc<AtomicBool> {
        self.sweeps_running
            .entry(code.clone())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    /// Tear down every task belonging to `code`.
    pub fn stop_room(&self, code: &RoomCode) {
        self.disarm_turn_timer(code);
        self.disarm_grace_retry(code);
        if let Some((_, task)) = self.janitors.remove(code) {
            task.abort();
        }
        self.sweeps_running.remove(code);
    }
}
