use super::AppState;
use crate::types::*;

impl AppState {
    /// Toggle lobby readiness. Only meaningful before the game starts.
    pub async fn set_ready(&self, code: &str, player_id: &str, ready: bool) -> Result<(), String> {
        self.update_room(code, |room| {
            if room.phase() != Phase::Lobby {
                return Err("Readiness can only change in the lobby".to_string());
            }
            let player = room.player_mut(player_id).ok_or("Player not found")?;
            if player.spectator {
                return Err("Spectators do not ready up".to_string());
            }
            player.ready = ready;
            Ok(())
        })
        .await
    }

}

impl Room {
    /// Everyone but the host has to ready up before a game can start.
    pub fn all_ready(&self) -> bool {
        self.participants()
            .iter()
            .all(|p| p.ready || p.id == self.host)
    }
}
