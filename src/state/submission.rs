//! Intake for round content: creative submissions, the capture artifact,
//! relay stages and proposed chain names.

use super::{AppState, PhaseTrigger};
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Accept a player's creative content for the current phase. What the
    /// content *is* depends on the mode and on who sends it: the capture
    /// subject delivers the artifact, everybody else an interpretation;
    /// twist players all submit; in relay only the current chain author
    /// may write.
    pub async fn submit_content(
        self: &Arc<Self>,
        code: &str,
        player_id: &str,
        content: String,
    ) -> Result<(), String> {
        if content.trim().is_empty() {
            return Err("Submission is empty".to_string());
        }

        let player_id_owned = player_id.to_string();
        let quorum = self
            .update_room(code, move |room| {
                if room.phase() != Phase::Submission {
                    return Err("Not accepting submissions right now".to_string());
                }
                if content.chars().count() > room.config.max_content_chars {
                    return Err("Submission too large".to_string());
                }
                let player = room.player(&player_id_owned).ok_or("Unknown player")?;
                if player.spectator {
                    return Err("Spectators don't submit".to_string());
                }

                let submission = Submission {
                    author: player_id_owned.clone(),
                    content,
                    created_at: chrono::Utc::now().to_rfc3339(),
                };
                let round = room.round.as_mut().ok_or("No active round")?;
                let counts_toward_quorum = match &mut round.data {
                    ModeData::Capture(data) => {
                        if data.subject == player_id_owned {
                            // The subject's delivery replaces the placeholder
                            // path but never counts toward the cohort.
                            data.artifact = Some(submission.content);
                            false
                        } else {
                            data.submissions.insert(player_id_owned.clone(), submission);
                            true
                        }
                    }
                    ModeData::Twist(data) => {
                        data.submissions.insert(player_id_owned.clone(), submission);
                        true
                    }
                    ModeData::Relay(data) => {
                        let current = data.order.get(data.position);
                        if current != Some(&player_id_owned) {
                            return Err("It's not your turn in the chain".to_string());
                        }
                        if room
                            .players
                            .iter()
                            .any(|p| p.id == player_id_owned && p.submitted)
                        {
                            return Err("Stage already delivered".to_string());
                        }
                        data.stages.push(RelayStage {
                            author: player_id_owned.clone(),
                            content: submission.content,
                            created_at: submission.created_at,
                        });
                        true
                    }
                };

                if counts_toward_quorum {
                    if let Some(p) = room.player_mut(&player_id_owned) {
                        p.submitted = true;
                    }
                }
                Ok(if room.all_submitted() {
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

    /// Relay only: record one proposed name for the finished chain. A
    /// resend overwrites the player's earlier proposal.
    pub async fn propose_name(
        self: &Arc<Self>,
        code: &str,
        player_id: &str,
        name: String,
    ) -> Result<(), String> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err("Name is empty".to_string());
        }

        let player_id_owned = player_id.to_string();
        let quorum = self
            .update_room(code, move |room| {
                if room.phase() != Phase::Naming {
                    return Err("Not accepting names right now".to_string());
                }
                if name.chars().count() > room.config.max_name_chars {
                    return Err("Name too long".to_string());
                }
                let player = room.player(&player_id_owned).ok_or("Unknown player")?;
                if player.spectator {
                    return Err("Spectators don't propose names".to_string());
                }
                let round = room.round.as_mut().ok_or("No active round")?;
                let ModeData::Relay(data) = &mut round.data else {
                    return Err("Only relay chains get named".to_string());
                };
                data.names.insert(player_id_owned.clone(), name);
                if let Some(p) = room.player_mut(&player_id_owned) {
                    p.submitted = true;
                }
                Ok(if room.all_named() {
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

    async fn started_room(mode: GameMode, players: usize) -> (Arc<AppState>, RoomCode, Vec<PlayerId>) {
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
    async fn test_capture_subject_delivery_is_not_quorum() {
        let (state, code, ids) = started_room(GameMode::Capture, 3).await;
        let subject = state
            .read_room(&code, |room| match &room.round.as_ref().unwrap().data {
                ModeData::Capture(d) => d.subject.clone(),
                _ => unreachable!(),
            })
            .await
            .unwrap();

        state
            .submit_content(&code, &subject, "the artifact".to_string())
            .await
            .unwrap();

        let (artifact, submitted, phase) = state
            .read_room(&code, |room| {
                let data = match &room.round.as_ref().unwrap().data {
                    ModeData::Capture(d) => d.artifact.clone(),
                    _ => unreachable!(),
                };
                (data, room.player(&subject).unwrap().submitted, room.phase())
            })
            .await
            .unwrap();
        assert_eq!(artifact.as_deref(), Some("the artifact"));
        assert!(!submitted);
        assert_eq!(phase, Phase::Submission);

        // Interpretations from everyone else complete the cohort.
        for id in ids.iter().filter(|id| **id != subject) {
            state
                .submit_content(&code, id, "my take".to_string())
                .await
                .unwrap();
        }
        assert_eq!(
            state.read_room(&code, |r| r.phase()).await.unwrap(),
            Phase::Voting
        );
    }

    #[tokio::test]
    async fn test_relay_rejects_out_of_turn_authors() {
        let (state, code, _ids) = started_room(GameMode::Relay, 3).await;
        let (current, waiting) = state
            .read_room(&code, |room| match &room.round.as_ref().unwrap().data {
                ModeData::Relay(d) => (d.order[0].clone(), d.order[1].clone()),
                _ => unreachable!(),
            })
            .await
            .unwrap();

        assert!(state
            .submit_content(&code, &waiting, "jumping the queue".to_string())
            .await
            .is_err());
        state
            .submit_content(&code, &current, "stage one".to_string())
            .await
            .unwrap();

        // The chain advanced to the second author.
        let position = state
            .read_room(&code, |room| match &room.round.as_ref().unwrap().data {
                ModeData::Relay(d) => d.position,
                _ => unreachable!(),
            })
            .await
            .unwrap();
        assert_eq!(position, 1);
    }

    #[tokio::test]
    async fn test_resubmission_replaces_earlier_content() {
        let (state, code, ids) = started_room(GameMode::Twist, 3).await;

        state
            .submit_content(&code, &ids[1], "first draft".to_string())
            .await
            .unwrap();
        state
            .submit_content(&code, &ids[1], "final version".to_string())
            .await
            .unwrap();

        let (count, content) = state
            .read_room(&code, |room| match &room.round.as_ref().unwrap().data {
                ModeData::Twist(d) => (
                    d.submissions.len(),
                    d.submissions.get(&ids[1]).unwrap().content.clone(),
                ),
                _ => unreachable!(),
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(content, "final version");
    }

    #[tokio::test]
    async fn test_naming_quorum_moves_to_voting() {
        let (state, code, ids) = started_room(GameMode::Relay, 3).await;

        // Walk the whole chain.
        for _ in 0..ids.len() {
            let current = state
                .read_room(&code, |room| match &room.round.as_ref().unwrap().data {
                    ModeData::Relay(d) => d.order[d.position].clone(),
                    _ => unreachable!(),
                })
                .await
                .unwrap();
            state
                .submit_content(&code, &current, "a stage".to_string())
                .await
                .unwrap();
        }
        assert_eq!(
            state.read_room(&code, |r| r.phase()).await.unwrap(),
            Phase::Naming
        );

        for id in &ids {
            state
                .propose_name(&code, id, format!("title by {}", id))
                .await
                .unwrap();
        }
        assert_eq!(
            state.read_room(&code, |r| r.phase()).await.unwrap(),
            Phase::Voting
        );
    }
}
