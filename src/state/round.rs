//! Prompt collection: the shared pool that later rounds draw from.

use super::{AppState, PhaseTrigger};
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Add a prompt to the room's pool. Players may seed more than one;
    /// quorum asks only that everyone contributed at least one.
    pub async fn submit_prompt(
        self: &Arc<Self>,
        code: &str,
        player_id: &str,
        text: String,
    ) -> Result<(), String> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err("Prompt is empty".to_string());
        }

        let player_id_owned = player_id.to_string();
        let quorum = self
            .update_room(code, move |room| {
                if room.phase() != Phase::PromptCollection {
                    return Err("Prompts are only collected before the first round".to_string());
                }
                if text.chars().count() > room.config.max_prompt_chars {
                    return Err("Prompt too long".to_string());
                }
                let player = room
                    .player(&player_id_owned)
                    .ok_or("Unknown player")?;
                if player.spectator {
                    return Err("Spectators don't submit prompts".to_string());
                }
                let round = room.round.as_mut().ok_or("No active round")?;
                round.prompt_pool.push(PromptEntry {
                    author: player_id_owned.clone(),
                    text,
                    used: false,
                });
                Ok(if room.all_prompted() {
                    Some(room.phase_key())
                } else {
                    None
                })
            })
            .await?;

        if let Some(key) = quorum {
            self.advance_phase(code, key, PhaseTrigger::Quorum).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[tokio::test]
    async fn test_prompt_rejected_outside_collection() {
        let state = Arc::new(AppState::new());
        let created = state.create_room("Host".to_string()).await;

        let result = state
            .submit_prompt(&created.code, &created.player_id, "draw a cat".to_string())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_prompt_length_and_emptiness_enforced() {
        let state = Arc::new(AppState::new());
        let created = state.create_room("Host".to_string()).await;
        for i in 0..2 {
            let joined = state
                .join_room(&created.code, format!("Player {}", i + 2), false, None)
                .await
                .unwrap();
            state
                .set_ready(&created.code, &joined.player_id, true)
                .await
                .unwrap();
        }
        state
            .start_game(&created.code, &created.player_id, GameMode::Capture, None)
            .await
            .unwrap();

        assert!(state
            .submit_prompt(&created.code, &created.player_id, "   ".to_string())
            .await
            .is_err());
        let long = "x".repeat(500);
        assert!(state
            .submit_prompt(&created.code, &created.player_id, long)
            .await
            .is_err());
        assert!(state
            .submit_prompt(&created.code, &created.player_id, "draw a cat".to_string())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_multiple_prompts_from_one_player_allowed() {
        let state = Arc::new(AppState::new());
        let created = state.create_room("Host".to_string()).await;
        for i in 0..2 {
            let joined = state
                .join_room(&created.code, format!("Player {}", i + 2), false, None)
                .await
                .unwrap();
            state
                .set_ready(&created.code, &joined.player_id, true)
                .await
                .unwrap();
        }
        state
            .start_game(&created.code, &created.player_id, GameMode::Capture, None)
            .await
            .unwrap();

        state
            .submit_prompt(&created.code, &created.player_id, "a cat".to_string())
            .await
            .unwrap();
        state
            .submit_prompt(&created.code, &created.player_id, "a dog".to_string())
            .await
            .unwrap();

        let (pool_len, phase) = state
            .read_room(&created.code, |room| {
                (
                    room.round.as_ref().unwrap().prompt_pool.len(),
                    room.phase(),
                )
            })
            .await
            .unwrap();
        assert_eq!(pool_len, 2);
        // One player seeding twice is not quorum.
        assert_eq!(phase, Phase::PromptCollection);
    }
}
