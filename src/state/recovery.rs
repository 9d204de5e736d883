//! Disconnection handling during a live game. A dropped socket marks the
//! player disconnected but keeps their seat and score; the token lets them
//! rejoin. What the round does about the gap depends on who left and what
//! the room was waiting for.

use super::{AppState, PhaseTrigger};
use crate::content::ContentCategory;
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// React to a player dropping mid-game. Runs for socket loss and for
    /// explicit leave outside the lobby; both are reconnectable.
    pub async fn handle_disconnect(self: &Arc<Self>, code: &str, player_id: &str) {
        let ok = self
            .update_room(code, |room| {
                if let Some(p) = room.player_mut(player_id) {
                    p.connected = false;
                    let name = p.name.clone();
                    tracing::info!("{} disconnected from room {}", name, room.code);
                }
                Ok(())
            })
            .await;
        if ok.is_err() {
            return;
        }

        let anyone_left = self
            .read_room(code, |room| room.players.iter().any(|p| p.connected))
            .await
            .unwrap_or(false);
        if !anyone_left {
            self.destroy_room(code).await;
            return;
        }

        if let Err(e) = self.recover_round(code, player_id).await {
            tracing::error!("Recovery after disconnect in room {}: {}", code, e);
        }
    }

    async fn recover_round(self: &Arc<Self>, code: &str, player_id: &str) -> Result<(), String> {
        let phase = self.read_room(code, |room| room.phase()).await?;
        if matches!(phase, Phase::Lobby | Phase::Ended) {
            return Ok(());
        }

        // The round can't continue below the mode's floor.
        let viable = self
            .read_room(code, |room| {
                let round = room.round.as_ref();
                round
                    .map(|r| room.participants().len() >= r.mode.min_players())
                    .unwrap_or(true)
            })
            .await?;
        if !viable {
            return self.end_game(code, "insufficient players").await;
        }

        // A capture subject who leaves before delivering forfeits the
        // artifact to a placeholder; interpreters keep playing.
        let subject_owes_artifact = self
            .read_room(code, |room| {
                room.phase() == Phase::Submission
                    && matches!(
                        room.round.as_ref().map(|r| &r.data),
                        Some(ModeData::Capture(d))
                            if d.subject == player_id && d.artifact.is_none()
                    )
            })
            .await?;
        if subject_owes_artifact {
            let language = self
                .read_room(code, |room| room.config.language.clone())
                .await?;
            let placeholder = self
                .content
                .random(ContentCategory::Placeholder, &language)
                .await
                .map_err(|e| e.to_string())?;
            self.update_room(code, move |room| {
                let round = room.round.as_mut().ok_or("No active round")?;
                if let ModeData::Capture(data) = &mut round.data {
                    data.artifact = Some(placeholder);
                }
                Ok(())
            })
            .await?;
        }

        // A relay chain stuck on the departed author moves on without their
        // stage. The timeout path already knows how to skip forward.
        let relay_blocked = self
            .read_room(code, |room| {
                let blocked = room.phase() == Phase::Submission
                    && matches!(
                        room.round.as_ref().map(|r| &r.data),
                        Some(ModeData::Relay(d))
                            if d.order.get(d.position) == Some(&player_id.to_string())
                    );
                if blocked {
                    Some(room.phase_key())
                } else {
                    None
                }
            })
            .await?;
        if let Some(key) = relay_blocked {
            return self.advance_phase(code, key, PhaseTrigger::Timeout).await;
        }

        // The departed player may have been the last hold-out; cohorts only
        // count connected players, so re-check the current quorum.
        let quorum = self
            .read_room(code, |room| {
                let complete = match room.phase() {
                    Phase::PromptCollection => room.all_prompted(),
                    Phase::Submission => room.all_submitted(),
                    Phase::Naming => room.all_named(),
                    Phase::Voting => room.all_voted(),
                    _ => false,
                };
                if complete {
                    Some(room.phase_key())
                } else {
                    None
                }
            })
            .await?;
        if let Some(key) = quorum {
            return self.advance_phase(code, key, PhaseTrigger::Quorum).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    async fn started_room(
        mode: GameMode,
        players: usize,
    ) -> (Arc<AppState>, RoomCode, Vec<PlayerId>) {
        let mut config = GameConfig::default();
        config.prompt_seconds = 0;
        let state = Arc::new(AppState::with_content(
            Arc::new(crate::content::BuiltinContent),
            config,
        ));
        let created = state.create_room("Player 1".to_string()).await;
        let mut ids = vec![created.player_id.clone()];
        for i in 1..players {
            let joined = state
                .join_room(&created.code, format!("Player {}", i + 1), false, None)
                .await
                .unwrap();
            state
                .set_ready(&created.code, &joined.player_id, true)
                .await
                .unwrap();
            ids.push(joined.player_id);
        }
        state
            .start_game(&created.code, &ids[0], mode, Some(2))
            .await
            .unwrap();
        (state, created.code, ids)
    }

    #[tokio::test]
    async fn test_last_holdout_disconnect_completes_quorum() {
        let (state, code, ids) = started_room(GameMode::Twist, 4).await;

        for id in &ids[..3] {
            state
                .submit_content(&code, id, "entry".to_string())
                .await
                .unwrap();
        }
        assert_eq!(
            state.read_room(&code, |r| r.phase()).await.unwrap(),
            Phase::Submission
        );

        state.handle_disconnect(&code, &ids[3]).await;
        assert_eq!(
            state.read_room(&code, |r| r.phase()).await.unwrap(),
            Phase::Voting
        );
    }

    #[tokio::test]
    async fn test_game_ends_below_mode_floor() {
        let (state, code, ids) = started_room(GameMode::Twist, 3).await;

        state.handle_disconnect(&code, &ids[2]).await;

        let (phase, reason) = state
            .read_room(&code, |room| {
                (
                    room.phase(),
                    room.round.as_ref().unwrap().end_reason.clone(),
                )
            })
            .await
            .unwrap();
        assert_eq!(phase, Phase::Ended);
        assert_eq!(reason.as_deref(), Some("insufficient players"));
    }

    #[tokio::test]
    async fn test_relay_skips_departed_author_mid_chain() {
        let (state, code, _ids) = started_room(GameMode::Relay, 5).await;

        let order = state
            .read_room(&code, |room| match &room.round.as_ref().unwrap().data {
                ModeData::Relay(d) => d.order.clone(),
                _ => unreachable!(),
            })
            .await
            .unwrap();

        // First two stages arrive, then the third author drops.
        for author in &order[..2] {
            state
                .submit_content(&code, author, "a stage".to_string())
                .await
                .unwrap();
        }
        state.handle_disconnect(&code, &order[2]).await;

        let position = state
            .read_room(&code, |room| match &room.round.as_ref().unwrap().data {
                ModeData::Relay(d) => d.position,
                _ => unreachable!(),
            })
            .await
            .unwrap();
        assert_eq!(position, 3);

        // The remaining authors finish; the chain holds four stages.
        for author in &order[3..] {
            state
                .submit_content(&code, author, "a stage".to_string())
                .await
                .unwrap();
        }
        let (phase, stages) = state
            .read_room(&code, |room| {
                let stages = match &room.round.as_ref().unwrap().data {
                    ModeData::Relay(d) => d.stages.len(),
                    _ => unreachable!(),
                };
                (room.phase(), stages)
            })
            .await
            .unwrap();
        assert_eq!(phase, Phase::Naming);
        assert_eq!(stages, 4);
    }

    #[tokio::test]
    async fn test_subject_disconnect_yields_placeholder_artifact() {
        let (state, code, _ids) = started_room(GameMode::Capture, 4).await;

        let subject = state
            .read_room(&code, |room| match &room.round.as_ref().unwrap().data {
                ModeData::Capture(d) => d.subject.clone(),
                _ => unreachable!(),
            })
            .await
            .unwrap();

        state.handle_disconnect(&code, &subject).await;

        let artifact = state
            .read_room(&code, |room| match &room.round.as_ref().unwrap().data {
                ModeData::Capture(d) => d.artifact.clone(),
                _ => unreachable!(),
            })
            .await
            .unwrap();
        assert!(artifact.is_some());
    }

    #[tokio::test]
    async fn test_room_destroyed_when_everyone_drops() {
        let (state, code, ids) = started_room(GameMode::Relay, 2).await;

        state.handle_disconnect(&code, &ids[0]).await;
        state.handle_disconnect(&code, &ids[1]).await;

        assert!(state.read_room(&code, |_| ()).await.is_err());
        assert_eq!(state.timers.pending_for_room(&code), 0);
    }

    #[tokio::test]
    async fn test_rejoin_restores_connection_and_score() {
        let (state, code, ids) = started_room(GameMode::Twist, 4).await;
        let token = state
            .read_room(&code, |room| room.player(&ids[1]).unwrap().token.clone())
            .await
            .unwrap();

        state.handle_disconnect(&code, &ids[1]).await;
        let rejoined = state
            .join_room(&code, "Player 2".to_string(), false, Some(token))
            .await
            .unwrap();

        assert!(rejoined.rejoined);
        assert_eq!(rejoined.player_id, ids[1]);
        let connected = state
            .read_room(&code, |room| room.player(&ids[1]).unwrap().connected)
            .await
            .unwrap();
        assert!(connected);
    }
}
