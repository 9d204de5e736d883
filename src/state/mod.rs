mod modes;
mod phase;
mod player;
mod quorum;
mod recovery;
mod room;
mod round;
mod score;
mod snapshot;
mod submission;
mod vote;

pub use phase::PhaseTrigger;
pub use room::JoinOutcome;
pub use vote::vote_counts;

use crate::content::{BuiltinContent, ContentProvider};
use crate::timer::TimerRegistry;
use crate::types::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, RwLock};

/// Event fanned out on a room's channel. Connections render their own
/// personalized snapshot on `Changed`, so the channel never carries another
/// player's private data.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// Room state changed; subscribers should re-render their snapshot.
    Changed,
    /// Live vote tallies for spectators during the voting phase.
    VoteCounts {
        counts: HashMap<String, u32>,
        seq: u64,
    },
}

/// Shared application state
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<RoomCode, Room>>>,
    channels: Arc<RwLock<HashMap<RoomCode, broadcast::Sender<RoomEvent>>>>,
    pub timers: TimerRegistry,
    /// Idempotency guard: (room, phase being left, phase sequence) entries
    /// currently mid-transition. The sequence number makes each visit of a
    /// phase its own key, so a held lock from an earlier instance (a relay
    /// micro-stage, a previous round's same phase) never shadows the
    /// current one. Released by a delay task, never by the transition
    /// itself.
    transition_locks: Mutex<HashSet<(RoomCode, Phase, u64)>>,
    pub content: Arc<dyn ContentProvider>,
    /// Defaults applied to newly created rooms.
    pub defaults: GameConfig,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_content(Arc::new(BuiltinContent), GameConfig::default())
    }

    pub fn with_content(content: Arc<dyn ContentProvider>, defaults: GameConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            channels: Arc::new(RwLock::new(HashMap::new())),
            timers: TimerRegistry::new(),
            transition_locks: Mutex::new(HashSet::new()),
            content,
            defaults,
        }
    }

    /// Subscribe to a room's event channel, creating it if needed.
    pub async fn subscribe(&self, code: &str) -> broadcast::Receiver<RoomEvent> {
        self.channel(code).await.subscribe()
    }

    pub(crate) async fn channel(&self, code: &str) -> broadcast::Sender<RoomEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(code.to_string())
            .or_insert_with(|| broadcast::channel(100).0)
            .clone()
    }

    /// Notify all of a room's connections that its state changed.
    pub async fn notify_room(&self, code: &str) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(code) {
            // No receivers connected is fine.
            let _ = tx.send(RoomEvent::Changed);
        }
    }

    pub(crate) async fn send_event(&self, code: &str, event: RoomEvent) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(code) {
            let _ = tx.send(event);
        }
    }

    /// Read access to a room.
    pub async fn read_room<T>(
        &self,
        code: &str,
        f: impl FnOnce(&Room) -> T,
    ) -> Result<T, String> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(code).ok_or("Room not found")?;
        Ok(f(room))
    }

    /// Mutate a room, bump its version and push a change notification. The
    /// closure runs synchronously under the write lock, so a handler's
    /// mutations are never observed half-applied.
    pub async fn update_room<T>(
        &self,
        code: &str,
        f: impl FnOnce(&mut Room) -> Result<T, String>,
    ) -> Result<T, String> {
        let out = {
            let mut rooms = self.rooms.write().await;
            let room = rooms.get_mut(code).ok_or("Room not found")?;
            let out = f(room)?;
            room.version += 1;
            out
        };
        self.notify_room(code).await;
        Ok(out)
    }

    pub(crate) fn try_lock_transition(&self, code: &str, phase: Phase, seq: u64) -> bool {
        let mut locks = self
            .transition_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        locks.insert((code.to_string(), phase, seq))
    }

    pub(crate) fn unlock_transition(&self, code: &str, phase: Phase, seq: u64) {
        let mut locks = self
            .transition_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        locks.remove(&(code.to_string(), phase, seq));
    }

    pub(crate) fn clear_transition_locks(&self, code: &str) {
        let mut locks = self
            .transition_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        locks.retain(|(room, _, _)| room != code);
    }

    /// Drop a room and everything keyed to it: timers, locks, channel.
    pub async fn destroy_room(&self, code: &str) {
        self.timers.clear_room(code);
        self.clear_transition_locks(code);
        self.rooms.write().await.remove(code);
        self.channels.write().await.remove(code);
        tracing::info!("Destroyed room {}", code);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
