use super::AppState;
use crate::types::*;
use rand::Rng;

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 5;

fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub code: RoomCode,
    pub player_id: PlayerId,
    pub token: String,
    pub rejoined: bool,
}

impl AppState {
    /// Create a room with the creator as host.
    pub async fn create_room(&self, host_name: String) -> JoinOutcome {
        // Collisions are rare with 24M combinations, retry anyway.
        let code = loop {
            let candidate = generate_room_code();
            let rooms = self.rooms.read().await;
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let host = Player::new(
            ulid::Ulid::new().to_string(),
            ulid::Ulid::new().to_string(),
            display_name(host_name, false),
            false,
        );
        let outcome = JoinOutcome {
            code: code.clone(),
            player_id: host.id.clone(),
            token: host.token.clone(),
            rejoined: false,
        };

        let room = Room {
            code: code.clone(),
            host: host.id.clone(),
            players: vec![host],
            config: self.defaults.clone(),
            round: None,
            version: 1,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.rooms.write().await.insert(code.clone(), room);
        tracing::info!("Created room {}", code);

        outcome
    }

    /// Join a room, or reconnect when a valid token is presented. A
    /// reconnect merges into the existing player record; identities are
    /// never reused or replaced. Anyone joining after the game started
    /// comes in as a spectator.
    pub async fn join_room(
        &self,
        code: &str,
        name: String,
        spectator: bool,
        token: Option<String>,
    ) -> Result<JoinOutcome, String> {
        let code_owned = code.to_string();
        self.update_room(code, move |room| {
            if let Some(token) = token {
                if let Some(p) = room.players.iter_mut().find(|p| p.token == token) {
                    p.connected = true;
                    tracing::info!("Player {} reconnected to room {}", p.id, room.code);
                    return Ok(JoinOutcome {
                        code: code_owned,
                        player_id: p.id.clone(),
                        token: p.token.clone(),
                        rejoined: true,
                    });
                }
            }

            let spectator = spectator || room.phase() != Phase::Lobby;
            let player = Player::new(
                ulid::Ulid::new().to_string(),
                ulid::Ulid::new().to_string(),
                display_name(name, spectator),
                spectator,
            );
            let outcome = JoinOutcome {
                code: code_owned,
                player_id: player.id.clone(),
                token: player.token.clone(),
                rejoined: false,
            };
            room.players.push(player);
            Ok(outcome)
        })
        .await
    }

    /// Explicitly leave a room. In the lobby the player is removed outright;
    /// mid-game they are treated like a disconnect so they can come back.
    pub async fn leave_room(self: &std::sync::Arc<Self>, code: &str, player_id: &str) {
        let in_lobby = matches!(
            self.read_room(code, |room| room.phase()).await,
            Ok(Phase::Lobby)
        );

        if !in_lobby {
            self.handle_disconnect(code, player_id).await;
            return;
        }

        let now_empty = self
            .update_room(code, |room| {
                room.players.retain(|p| p.id != player_id);
                if room.host == player_id {
                    if let Some(next) = room.players.iter().find(|p| !p.spectator) {
                        room.host = next.id.clone();
                        tracing::info!("Host of room {} left, promoted {}", room.code, room.host);
                    }
                }
                Ok(room.players.is_empty())
            })
            .await
            .unwrap_or(true);

        if now_empty {
            self.destroy_room(code).await;
        }
    }

    /// Full restart back to the lobby: every score zeroed, round state
    /// dropped, no leftover armed timers or transition locks.
    pub async fn restart_game(&self, code: &str, requester: &str) -> Result<(), String> {
        self.timers.clear_room(code);
        self.clear_transition_locks(code);
        self.update_room(code, |room| {
            if !room.is_host(requester) {
                return Err("Only the host can restart the game".to_string());
            }
            room.round = None;
            for p in room.players.iter_mut() {
                p.score = 0;
                p.ready = false;
                p.reset_round_flags();
            }
            tracing::info!("Room {} restarted to lobby", room.code);
            Ok(())
        })
        .await
    }
}

fn display_name(name: String, spectator: bool) -> String {
    let trimmed = name.trim().to_string();
    if !trimmed.is_empty() {
        return trimmed;
    }
    if spectator {
        // Auto-generated friendly names for anonymous spectators.
        petname::petname(2, "-").unwrap_or_else(|| "quiet-observer".to_string())
    } else {
        "Anonymous".to_string()
    }
}
