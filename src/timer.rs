use crate::types::RoomCode;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::task::JoinHandle;

/// What a timer is armed for. Keys are per room *and* per purpose so that
/// re-arming one purpose never disturbs another room's timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerPurpose {
    PromptCollection,
    Submission,
    RelayStage,
    Naming,
    Voting,
}

/// Explicit registry of pending phase timers, keyed room code -> purpose.
/// Setting a timer for a key always aborts the prior one first; room
/// teardown aborts every timer keyed to that room. An aborted timer simply
/// never fires.
#[derive(Default)]
pub struct TimerRegistry {
    inner: Mutex<HashMap<(RoomCode, TimerPurpose), JoinHandle<()>>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timer task for (room, purpose), aborting any prior one.
    pub fn set(&self, room: &str, purpose: TimerPurpose, handle: JoinHandle<()>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = inner.insert((room.to_string(), purpose), handle) {
            old.abort();
        }
    }

    /// Abort and remove every timer keyed to a room (room teardown, game
    /// end, restart).
    pub fn clear_room(&self, room: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let keys: Vec<_> = inner
            .keys()
            .filter(|(code, _)| code == room)
            .cloned()
            .collect();
        for key in keys {
            if let Some(handle) = inner.remove(&key) {
                handle.abort();
            }
        }
    }

    /// Whether a timer for (room, purpose) is still pending.
    pub fn is_pending(&self, room: &str, purpose: TimerPurpose) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .get(&(room.to_string(), purpose))
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Number of pending timers for a room.
    pub fn pending_for_room(&self, room: &str) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .iter()
            .filter(|((code, _), handle)| code == room && !handle.is_finished())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sleeper(secs: u64) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
        })
    }

    #[tokio::test]
    async fn test_set_replaces_prior_timer() {
        let registry = TimerRegistry::new();
        let first = sleeper(60);

        registry.set("ABCDE", TimerPurpose::Submission, first);
        assert!(registry.is_pending("ABCDE", TimerPurpose::Submission));

        registry.set("ABCDE", TimerPurpose::Submission, sleeper(60));
        // Still exactly one timer for this key.
        assert_eq!(registry.pending_for_room("ABCDE"), 1);
    }

    #[tokio::test]
    async fn test_clear_room_aborts_everything() {
        let registry = TimerRegistry::new();
        registry.set("ABCDE", TimerPurpose::Submission, sleeper(60));
        registry.set("ABCDE", TimerPurpose::Voting, sleeper(60));
        registry.set("ZZZZZ", TimerPurpose::Voting, sleeper(60));

        registry.clear_room("ABCDE");
        assert_eq!(registry.pending_for_room("ABCDE"), 0);
        assert!(registry.is_pending("ZZZZZ", TimerPurpose::Voting));
    }
}
