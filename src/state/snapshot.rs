//! Per-viewer room projection. Every outbound state push is a full
//! snapshot rendered for one connection, so privacy filtering happens in
//! exactly one place: in-progress content stays with its author until the
//! reveal, the twist instruction only ever reaches its holder, and the
//! holder's identity stays hidden until scoring has run.

use super::AppState;
use crate::protocol::{NameView, RelayStageView, RoomSnapshot, RoundView, SubmissionView};
use crate::types::*;

impl AppState {
    /// Render the room as `viewer` is allowed to see it. `None` renders the
    /// spectator projection.
    pub async fn snapshot_for(
        &self,
        code: &str,
        viewer: Option<&str>,
    ) -> Result<RoomSnapshot, String> {
        self.read_room(code, |room| snapshot(room, viewer)).await
    }
}

pub(crate) fn snapshot(room: &Room, viewer: Option<&str>) -> RoomSnapshot {
    let round = room.round.as_ref();
    RoomSnapshot {
        code: room.code.clone(),
        host: room.host.clone(),
        phase: room.phase(),
        version: room.version,
        server_now: chrono::Utc::now().to_rfc3339(),
        deadline: round.and_then(|r| r.deadline.clone()),
        mode: round.map(|r| r.mode),
        round_no: round.map(|r| r.round_no),
        total_rounds: round.map(|r| r.total_rounds),
        players: room
            .players
            .iter()
            .map(|p| crate::protocol::PlayerInfo::for_player(p, &room.host))
            .collect(),
        round: round.map(|r| round_view(room, r, viewer)),
        skipped: round.and_then(|r| r.skipped.clone()),
        awards: round.map(|r| r.awards.clone()).unwrap_or_default(),
        end_reason: round.and_then(|r| r.end_reason.clone()),
    }
}

fn round_view(room: &Room, round: &RoundState, viewer: Option<&str>) -> RoundView {
    // Finalized submissions become public once there is something to vote
    // on; before that each player only sees their own.
    let revealed = matches!(
        round.phase,
        Phase::Naming | Phase::Voting | Phase::Reveal | Phase::Ended
    );

    match &round.data {
        ModeData::Capture(data) => RoundView::Capture {
            prompt: data.prompt.clone(),
            subject: data.subject.clone(),
            artifact: data.artifact.clone(),
            submissions: if revealed {
                ordered_submissions(room, &data.submissions)
            } else {
                Vec::new()
            },
            your_submission: viewer
                .and_then(|v| data.submissions.get(v))
                .map(|s| s.content.clone()),
            your_vote: viewer.and_then(|v| data.votes.get(v)).cloned(),
        },
        ModeData::Twist(data) => {
            let is_holder = viewer == Some(data.holder.as_str());
            let scored = matches!(round.phase, Phase::Reveal | Phase::Ended);
            RoundView::Twist {
                prompt: data.prompt.clone(),
                twist: if is_holder || scored {
                    Some(data.twist.clone())
                } else {
                    None
                },
                holder: if scored {
                    Some(data.holder.clone())
                } else {
                    None
                },
                submissions: if revealed {
                    ordered_submissions(room, &data.submissions)
                } else {
                    Vec::new()
                },
                your_submission: viewer
                    .and_then(|v| data.submissions.get(v))
                    .map(|s| s.content.clone()),
                your_vote: viewer.and_then(|v| data.votes.get(v)).cloned(),
            }
        }
        ModeData::Relay(data) => {
            let current_author = data.order.get(data.position).cloned();
            let is_current = viewer.is_some() && viewer == current_author.as_deref();
            RoundView::Relay {
                chain_length: data.stages.len(),
                position: data.position,
                current_author,
                // The chain is a secret during the traversal; only the
                // player holding the pen sees what they are continuing.
                previous_stage: if is_current && !revealed {
                    data.stages.last().map(|s| RelayStageView {
                        index: data.stages.len() - 1,
                        author: s.author.clone(),
                        content: s.content.clone(),
                    })
                } else {
                    None
                },
                stages: if revealed {
                    data.stages
                        .iter()
                        .enumerate()
                        .map(|(index, s)| RelayStageView {
                            index,
                            author: s.author.clone(),
                            content: s.content.clone(),
                        })
                        .collect()
                } else {
                    Vec::new()
                },
                names: if matches!(round.phase, Phase::Voting | Phase::Reveal | Phase::Ended) {
                    ordered_names(room, data)
                } else {
                    Vec::new()
                },
                your_name: viewer.and_then(|v| data.names.get(v)).cloned(),
                your_stage_vote: viewer.and_then(|v| data.stage_votes.get(v)).copied(),
                your_name_vote: viewer.and_then(|v| data.name_votes.get(v)).cloned(),
            }
        }
    }
}

/// Room player order keeps submission lists stable across re-renders.
fn ordered_submissions(
    room: &Room,
    submissions: &std::collections::HashMap<PlayerId, Submission>,
) -> Vec<SubmissionView> {
    room.players
        .iter()
        .filter_map(|p| {
            submissions.get(&p.id).map(|s| SubmissionView {
                author: s.author.clone(),
                content: s.content.clone(),
            })
        })
        .collect()
}

fn ordered_names(room: &Room, data: &RelayData) -> Vec<NameView> {
    room.players
        .iter()
        .filter_map(|p| {
            data.names.get(&p.id).map(|name| NameView {
                author: p.id.clone(),
                name: name.clone(),
            })
        })
        .collect()
}
