//! Transition Coordinator
//!
//! The single authority that may change `RoundState.phase`. Player-action
//! quorum and timer expiry both funnel into [`AppState::advance_phase`],
//! each carrying the phase-instance key it was armed for: a trigger whose
//! key no longer matches the room is stale and does nothing. Among triggers
//! for the *same* instance, a per-(room, phase, seq) lock collapses the
//! race into one execution. The lock is released by a short delay task
//! after the transition body has finished, never by the body itself, so a
//! quorum trigger and a timer trigger landing in the same tick cannot both
//! run.

use super::{modes, score, AppState};
use crate::content::ContentCategory;
use crate::timer::TimerPurpose;
use crate::types::*;
use std::sync::Arc;
use std::time::Duration;

/// How long a (room, phase, seq) transition lock stays held after the body
/// ran.
const LOCK_RELEASE_DELAY: Duration = Duration::from_millis(500);

/// What asked for the phase to advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTrigger {
    /// Everyone in the cohort has acted.
    Quorum,
    /// The phase timer expired; advance with whatever data exists.
    Timeout,
}

impl AppState {
    /// Advance a room out of the phase instance named by `expected`, which
    /// the caller captured when the trigger was armed (timer) or detected
    /// (quorum). No-op when the room has since moved on, or when another
    /// trigger already claimed this transition.
    pub async fn advance_phase(
        self: &Arc<Self>,
        code: &str,
        expected: (Phase, u64),
        trigger: PhaseTrigger,
    ) -> Result<(), String> {
        let (phase, seq) = expected;

        // A straggling trigger must never act on whatever phase happens to
        // run now; the key it carries decides, not current state.
        let current = self.read_room(code, |room| room.phase_key()).await?;
        if current != expected {
            tracing::debug!(
                "Stale {:?} trigger for room {} (armed for {:?}#{}, now {:?}#{}), ignoring",
                trigger,
                code,
                phase,
                seq,
                current.0,
                current.1
            );
            return Ok(());
        }

        if !self.try_lock_transition(code, phase, seq) {
            tracing::debug!(
                "Transition out of {:?} already in progress for room {}, ignoring {:?}",
                phase,
                code,
                trigger
            );
            return Ok(());
        }

        let result = self.run_transition(code, phase, trigger).await;

        let state = self.clone();
        let code = code.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(LOCK_RELEASE_DELAY).await;
            state.unlock_transition(&code, phase, seq);
        });

        result
    }

    async fn run_transition(
        self: &Arc<Self>,
        code: &str,
        phase: Phase,
        trigger: PhaseTrigger,
    ) -> Result<(), String> {
        tracing::info!("Room {} leaving {:?} ({:?})", code, phase, trigger);
        match phase {
            Phase::PromptCollection => self.begin_round(code).await,
            Phase::Submission => {
                let mode = self
                    .read_room(code, |room| room.round.as_ref().map(|r| r.mode))
                    .await?
                    .ok_or("No active round")?;
                if mode == GameMode::Relay {
                    self.step_relay(code).await
                } else {
                    self.end_submission(code).await
                }
            }
            Phase::Naming => self.enter_voting(code).await,
            Phase::Voting => self.enter_reveal(code).await,
            // Lobby, RoundSetup, Reveal and Ended have no quorum/timer exit.
            other => {
                tracing::warn!("Ignoring {:?} trigger in phase {:?}", trigger, other);
                Ok(())
            }
        }
    }

    /// Host starts the game: the mode is fixed for the whole game here and
    /// the round budget is capped at the connected player count.
    pub async fn start_game(
        self: &Arc<Self>,
        code: &str,
        requester: &str,
        mode: GameMode,
        rounds: Option<u32>,
    ) -> Result<(), String> {
        let collect_prompts = self
            .update_room(code, |room| {
                if !room.is_host(requester) {
                    return Err("Only the host can start the game".to_string());
                }
                if room.phase() != Phase::Lobby {
                    return Err("Game already started".to_string());
                }
                let participants = room.participants().len();
                if participants < mode.min_players() {
                    return Err(format!(
                        "{:?} needs at least {} players",
                        mode,
                        mode.min_players()
                    ));
                }
                if !room.all_ready() {
                    return Err("Not everyone is ready".to_string());
                }

                let configured = rounds.unwrap_or(room.config.rounds).max(1);
                let total_rounds = configured.min(participants as u32);
                let mut round = RoundState::first(mode, total_rounds);

                let collect = room.config.prompt_seconds > 0;
                if collect {
                    round.set_phase(Phase::PromptCollection);
                    round.deadline = deadline_in(room.config.prompt_seconds);
                }
                room.round = Some(round);
                for p in room.players.iter_mut() {
                    p.reset_round_flags();
                }
                tracing::info!(
                    "Room {} started: mode {:?}, {} rounds",
                    room.code,
                    mode,
                    total_rounds
                );
                Ok(collect)
            })
            .await?;

        if collect_prompts {
            let secs = self.phase_seconds(code, TimerPurpose::PromptCollection).await;
            self.arm_phase_timer(code, TimerPurpose::PromptCollection, secs)
                .await;
            Ok(())
        } else {
            self.begin_round(code).await
        }
    }

    /// Host advances from the reveal to the next round, or ends the game
    /// when the round budget is spent.
    pub async fn next_round(self: &Arc<Self>, code: &str, requester: &str) -> Result<(), String> {
        enum Next {
            Round,
            End,
        }
        let next = self
            .update_room(code, |room| {
                if !room.is_host(requester) {
                    return Err("Only the host can advance rounds".to_string());
                }
                if room.phase() != Phase::Reveal {
                    return Err("Rounds advance from the reveal".to_string());
                }
                let round = room.round.as_ref().ok_or("No active round")?;
                if round.round_no >= round.total_rounds {
                    return Ok(Next::End);
                }
                let successor = round.successor();
                room.round = Some(successor);
                for p in room.players.iter_mut() {
                    p.reset_round_flags();
                }
                Ok(Next::Round)
            })
            .await?;

        match next {
            Next::Round => self.begin_round(code).await,
            Next::End => self.end_game(code, "rounds complete").await,
        }
    }

    /// Round setup: the active mode strategy builds its data, then the room
    /// immediately enters the submission phase. The fallback fetches run
    /// before the mutation so the room lock is never held across an await.
    pub(crate) async fn begin_round(self: &Arc<Self>, code: &str) -> Result<(), String> {
        let language = self
            .read_room(code, |room| room.config.language.clone())
            .await?;
        let fallback_prompt = self
            .content
            .random(ContentCategory::Prompt, &language)
            .await
            .map_err(|e| e.to_string())?;
        let twist = self
            .content
            .random(ContentCategory::Twist, &language)
            .await
            .map_err(|e| e.to_string())?;

        self.update_room(code, |room| {
            let round = room.round.as_mut().ok_or("No active round")?;
            round.set_phase(Phase::RoundSetup);
            round.deadline = None;
            for p in room.players.iter_mut() {
                p.reset_round_flags();
            }
            modes::setup_round(room, fallback_prompt, twist)
        })
        .await?;

        self.enter_submission(code).await
    }

    pub(crate) async fn enter_submission(self: &Arc<Self>, code: &str) -> Result<(), String> {
        let purpose = self
            .update_room(code, |room| {
                let is_relay = matches!(
                    room.round.as_ref().map(|r| r.mode),
                    Some(GameMode::Relay)
                );
                let purpose = if is_relay {
                    TimerPurpose::RelayStage
                } else {
                    TimerPurpose::Submission
                };
                let secs = if is_relay {
                    room.config.relay_stage_seconds
                } else {
                    room.config.submission_seconds
                };
                let round = room.round.as_mut().ok_or("No active round")?;
                round.set_phase(Phase::Submission);
                round.deadline = deadline_in(secs);
                Ok(purpose)
            })
            .await?;

        let secs = self.phase_seconds(code, purpose).await;
        self.arm_phase_timer(code, purpose, secs).await;
        Ok(())
    }

    /// One relay micro-stage is over, by quorum (stage delivered) or by
    /// timeout (stage author skipped). Move to the next still-connected
    /// author, or out of the submission phase when the traversal is done.
    pub(crate) async fn step_relay(self: &Arc<Self>, code: &str) -> Result<(), String> {
        let more_stages = self
            .update_room(code, |room| {
                let connected: Vec<PlayerId> = room
                    .players
                    .iter()
                    .filter(|p| p.connected)
                    .map(|p| p.id.clone())
                    .collect();
                let round = room.round.as_mut().ok_or("No active round")?;
                let ModeData::Relay(data) = &mut round.data else {
                    return Err("Not a relay round".to_string());
                };
                data.position += 1;
                // Skip forward past disconnected players.
                while data
                    .order
                    .get(data.position)
                    .map(|id| !connected.contains(id))
                    .unwrap_or(false)
                {
                    data.position += 1;
                }
                let more = data.position < data.order.len();
                if more {
                    // Same phase, new instance: the next author's micro-stage
                    // gets its own key so triggers for the previous one
                    // cannot reach it.
                    round.set_phase(Phase::Submission);
                    round.deadline = deadline_in(room.config.relay_stage_seconds);
                }
                for p in room.players.iter_mut() {
                    p.submitted = false;
                }
                Ok(more)
            })
            .await?;

        if more_stages {
            let secs = self.phase_seconds(code, TimerPurpose::RelayStage).await;
            self.arm_phase_timer(code, TimerPurpose::RelayStage, secs)
                .await;
            return Ok(());
        }

        let chain_empty = self
            .read_room(code, |room| match room.round.as_ref().map(|r| &r.data) {
                Some(ModeData::Relay(data)) => data.stages.is_empty(),
                _ => true,
            })
            .await?;
        if chain_empty {
            self.skip_to_reveal(code, "no submissions", None).await
        } else {
            self.enter_naming(code).await
        }
    }

    pub(crate) async fn enter_naming(self: &Arc<Self>, code: &str) -> Result<(), String> {
        self.update_room(code, |room| {
            let secs = room.config.naming_seconds;
            let round = room.round.as_mut().ok_or("No active round")?;
            round.set_phase(Phase::Naming);
            round.deadline = deadline_in(secs);
            // The submitted flag is reused to track proposed names.
            for p in room.players.iter_mut() {
                p.submitted = false;
            }
            Ok(())
        })
        .await?;

        let secs = self.phase_seconds(code, TimerPurpose::Naming).await;
        self.arm_phase_timer(code, TimerPurpose::Naming, secs).await;
        Ok(())
    }

    /// Leave the submission phase (Capture/Twist): evaluate the edge cases
    /// before the dependent voting phase runs in a vacuum.
    pub(crate) async fn end_submission(self: &Arc<Self>, code: &str) -> Result<(), String> {
        let (submitters, voters) = self
            .read_room(code, |room| {
                let submitters = match room.round.as_ref().map(|r| &r.data) {
                    Some(ModeData::Capture(d)) => d.submissions.len(),
                    Some(ModeData::Twist(d)) => d.submissions.len(),
                    _ => 0,
                };
                (submitters, room.voting_cohort().len())
            })
            .await?;

        if submitters == 0 {
            return self.skip_to_reveal(code, "no submissions", None).await;
        }
        if submitters == 1 {
            // One lone submitter gets consolation credit instead of a vote
            // against nobody.
            let lone = self
                .read_room(code, |room| match room.round.as_ref().map(|r| &r.data) {
                    Some(ModeData::Capture(d)) => d.submissions.keys().next().cloned(),
                    Some(ModeData::Twist(d)) => d.submissions.keys().next().cloned(),
                    _ => None,
                })
                .await?;
            return self
                .skip_to_reveal(code, "single submission", lone)
                .await;
        }
        if voters == 0 {
            return self.skip_to_reveal(code, "insufficient voters", None).await;
        }
        self.enter_voting(code).await
    }

    pub(crate) async fn enter_voting(self: &Arc<Self>, code: &str) -> Result<(), String> {
        // A capture subject who never delivered gets a placeholder before
        // anyone votes on interpretations of nothing.
        let needs_placeholder = self
            .read_room(code, |room| {
                matches!(
                    room.round.as_ref().map(|r| &r.data),
                    Some(ModeData::Capture(d)) if d.artifact.is_none()
                )
            })
            .await?;
        let placeholder = if needs_placeholder {
            let language = self
                .read_room(code, |room| room.config.language.clone())
                .await?;
            Some(
                self.content
                    .random(ContentCategory::Placeholder, &language)
                    .await
                    .map_err(|e| e.to_string())?,
            )
        } else {
            None
        };

        self.update_room(code, |room| {
            let secs = room.config.voting_seconds;
            let round = room.round.as_mut().ok_or("No active round")?;
            if let (Some(placeholder), ModeData::Capture(data)) =
                (placeholder, &mut round.data)
            {
                data.artifact = Some(placeholder);
            }
            round.set_phase(Phase::Voting);
            round.deadline = deadline_in(secs);
            for p in room.players.iter_mut() {
                p.voted = false;
            }
            Ok(())
        })
        .await?;

        let secs = self.phase_seconds(code, TimerPurpose::Voting).await;
        self.arm_phase_timer(code, TimerPurpose::Voting, secs).await;
        Ok(())
    }

    /// The reveal owns no timer; the host explicitly advances from here.
    pub(crate) async fn enter_reveal(self: &Arc<Self>, code: &str) -> Result<(), String> {
        self.timers.clear_room(code);
        self.update_room(code, |room| {
            {
                let round = room.round.as_mut().ok_or("No active round")?;
                round.set_phase(Phase::Reveal);
                round.deadline = None;
            }
            let skipped = room
                .round
                .as_ref()
                .map(|r| r.skipped.is_some())
                .unwrap_or(false);
            if !skipped {
                score::score_round(room);
            }
            Ok(())
        })
        .await
    }

    /// Record the round as skipped and jump straight to the reveal,
    /// optionally crediting a lone participant.
    pub(crate) async fn skip_to_reveal(
        self: &Arc<Self>,
        code: &str,
        reason: &str,
        consolation: Option<PlayerId>,
    ) -> Result<(), String> {
        tracing::info!("Room {} skipping round: {}", code, reason);
        let reason = reason.to_string();
        self.update_room(code, move |room| {
            {
                let round = room.round.as_mut().ok_or("No active round")?;
                round.skipped = Some(reason);
            }
            if let Some(player) = consolation {
                score::apply_awards(
                    room,
                    vec![PointAward {
                        player,
                        points: 25,
                        reason: "consolation".to_string(),
                    }],
                );
            }
            Ok(())
        })
        .await?;
        self.enter_reveal(code).await
    }

    /// End the game: terminal phase, no timers left armed.
    pub(crate) async fn end_game(self: &Arc<Self>, code: &str, reason: &str) -> Result<(), String> {
        self.timers.clear_room(code);
        self.clear_transition_locks(code);
        let reason = reason.to_string();
        self.update_room(code, move |room| {
            let round = room.round.as_mut().ok_or("No active round")?;
            round.set_phase(Phase::Ended);
            round.deadline = None;
            round.end_reason = Some(reason.clone());
            tracing::info!("Room {} ended: {}", room.code, reason);
            Ok(())
        })
        .await
    }

    /// Arm the one timer this phase owns. Any previously running timer for
    /// the room is cleared first; no room ever has two live phase timers.
    /// The timer captures the phase key at arm time, so even an escaped
    /// timer fires as a stale no-op once the room has moved on.
    pub(crate) fn arm_phase_timer(
        self: &Arc<Self>,
        code: &str,
        purpose: TimerPurpose,
        secs: u32,
    ) -> futures::future::BoxFuture<'static, ()> {
        let this = self.clone();
        let code = code.to_string();
        Box::pin(async move {
            this.timers.clear_room(&code);
            let Ok(key) = this.read_room(&code, |room| room.phase_key()).await else {
                return;
            };

            let state = this.clone();
            let room = code.to_string();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs as u64)).await;
                tracing::debug!("Timer {:?} fired for room {}", purpose, room);
                if let Err(e) = state.advance_phase(&room, key, PhaseTrigger::Timeout).await {
                    tracing::error!("Timeout advance failed for room {}: {}", room, e);
                }
            });
            this.timers.set(&code, purpose, handle);
        })
    }

    async fn phase_seconds(&self, code: &str, purpose: TimerPurpose) -> u32 {
        self.read_room(code, |room| match purpose {
            TimerPurpose::PromptCollection => room.config.prompt_seconds,
            TimerPurpose::Submission => room.config.submission_seconds,
            TimerPurpose::RelayStage => room.config.relay_stage_seconds,
            TimerPurpose::Naming => room.config.naming_seconds,
            TimerPurpose::Voting => room.config.voting_seconds,
        })
        .await
        .unwrap_or(30)
    }
}

fn deadline_in(secs: u32) -> Option<String> {
    Some((chrono::Utc::now() + chrono::Duration::seconds(secs as i64)).to_rfc3339())
}
