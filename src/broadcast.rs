use crate::state::{vote_counts, AppState, RoomEvent};
use crate::types::Phase;
use std::sync::Arc;
use std::time::Duration;

/// Spawn a background task that streams live vote tallies to spectator
/// connections of every room currently in its voting phase
pub fn spawn_vote_broadcaster(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut seq = 0u64;

        loop {
            tokio::time::sleep(Duration::from_millis(500)).await;

            let voting: Vec<(String, std::collections::HashMap<String, u32>)> = {
                let rooms = state.rooms.read().await;
                rooms
                    .values()
                    .filter(|room| room.phase() == Phase::Voting)
                    .map(|room| (room.code.clone(), vote_counts(room)))
                    .collect()
            };

            for (code, counts) in voting {
                seq += 1;
                state
                    .send_event(&code, RoomEvent::VoteCounts { counts, seq })
                    .await;
            }
        }
    });
}
