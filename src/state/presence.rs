//! Volatile heartbeat bookkeeping.
//!
//! The persisted room document carries the authoritative `connected` flag;
//! this tracker only remembers the last heartbeat per player so the liveness
//! sweep can decide who lapsed. Entries disappear when a player leaves, is
//! kicked, or the room is deleted.

use dashmap::DashMap;
use uuid::Uuid;

use crate::dao::models::RoomCode;

/// Last-heartbeat table keyed by room and player.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    heartbeats: DashMap<(RoomCode, Uuid), u64>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a heartbeat observed at `now_ms`.
    pub fn record(&self, code: &RoomCode, player_id: Uuid, now_ms: u64) {
        self.heartbeats.insert((code.clone(), player_id), now_ms);
    }

    /// Timestamp of the player's most recent heartbeat, if any.
    pub fn last_seen(&self, code: &RoomCode, player_id: Uuid) -> Option<u64> {
        self.heartbeats
            .get(&(code.clone(), player_id))
            .map(|entry| *entry.value())
    }

    /// Drop a single player's heartbeat entry.
    pub fn forget(&self, code: &RoomCode, player_id: Uuid) {
        self.heartbeats.remove(&(code.clone(), player_id));
    }

    /// Drop every heartbeat entry belonging to `code`.
    pub fn forget_room(&self, code: &RoomCode) {
        self.heartbeats.retain(|(entry_code, _), _| entry_code != code);
    }

    /// Players of `code` whose last heartbeat is older than `timeout_ms`,
    /// paired with that last heartbeat.
    pub fn lapsed(&self, code: &RoomCode, timeout_ms: u64, now_ms: u64) -> Vec<(Uuid, u64)> {
        self.heartbeats
            .iter()
            .filter(|entry| {
                let (entry_code, _) = entry.key();
                entry_code == code && now_ms.saturating_sub(*entry.value()) > timeout_ms
            })
            .map(|entry| (entry.key().1, *entry.value()))
            .collect()
    }

    /// Distinct room codes with at least one tracked heartbeat.
    pub fn tracked_rooms(&self) -> Vec<RoomCode> {
        let mut codes: Vec<RoomCode> = self
            .heartbeats
            .iter()
            .map(|entry| entry.key().0.clone())
            .collect();
        codes.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        codes.dedup();
        codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> RoomCode {
        RoomCode::new(s)
    }

    #[test]
    fn lapsed_reports_only_stale_entries_of_the_room() {
        let tracker = PresenceTracker::new();
        let fresh = Uuid::new_v4();
        let stale = Uuid::new_v4();
        let elsewhere = Uuid::new_v4();

        tracker.record(&code("AAAA"), fresh, 10_000);
        tracker.record(&code("AAAA"), stale, 1_000);
        tracker.record(&code("BBBB"), elsewhere, 1_000);

        let lapsed = tracker.lapsed(&code("AAAA"), 5_000, 12_000);
        assert_eq!(lapsed, vec![(stale, 1_000)]);
    }

    #[test]
    fn forget_room_clears_all_entries_for_that_code() {
        let tracker = PresenceTracker::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        tracker.record(&code("AAAA"), a, 1);
        tracker.record(&code("AAAA"), b, 2);
        tracker.record(&code("BBBB"), a, 3);

        tracker.forget_room(&code("AAAA"));
        assert_eq!(tracker.last_seen(&code("AAAA"), a), None);
        assert_eq!(tracker.last_seen(&code("AAAA"), b), None);
        assert_eq!(tracker.last_seen(&code("BBBB"), a), Some(3));
        assert_eq!(tracker.tracked_rooms(), vec![code("BBBB")]);
    }

    #[test]
    fn record_overwrites_the_previous_heartbeat() {
        let tracker = PresenceTracker::new();
        let player = Uuid::new_v4();

        tracker.record(&code("CCCC"), player, 100);
        tracker.record(&code("CCCC"), player, 200);
        assert_eq!(tracker.last_seen(&code("CCCC"), player), Some(200));
        assert!(tracker.lapsed(&code("CCCC"), 50, 220).is_empty());
    }
}
