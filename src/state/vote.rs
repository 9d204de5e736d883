//! Vote intake and tallies. Ballots are validated against the current
//! mode's electorate and candidates; a resend overwrites the earlier
//! ballot so players can change their mind until the phase closes.

use super::{AppState, PhaseTrigger};
use crate::protocol::VoteTarget;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;

impl AppState {
    pub async fn cast_vote(
        self: &Arc<Self>,
        code: &str,
        player_id: &str,
        target: VoteTarget,
    ) -> Result<(), String> {
        let player_id_owned = player_id.to_string();
        let quorum = self
            .update_room(code, move |room| {
                if room.phase() != Phase::Voting {
                    return Err("Not accepting votes right now".to_string());
                }
                let player = room.player(&player_id_owned).ok_or("Unknown player")?;
                if player.spectator {
                    return Err("Spectators watch the tally, they don't vote".to_string());
                }
                if !room.voting_cohort().contains(&player_id_owned) {
                    return Err("You don't vote this round".to_string());
                }

                let participants = room.participant_ids();
                let round = room.round.as_mut().ok_or("No active round")?;
                let complete = match (&mut round.data, target) {
                    (ModeData::Capture(data), VoteTarget::Author { player }) => {
                        if player == player_id_owned {
                            return Err("You can't vote for your own submission".to_string());
                        }
                        if !data.submissions.contains_key(&player) {
                            return Err("That player has no submission".to_string());
                        }
                        data.votes.insert(player_id_owned.clone(), player);
                        true
                    }
                    (ModeData::Twist(data), VoteTarget::Author { player }) => {
                        if player == player_id_owned {
                            return Err("You can't accuse yourself".to_string());
                        }
                        if !participants.contains(&player) {
                            return Err("That player isn't in the round".to_string());
                        }
                        data.votes.insert(player_id_owned.clone(), player);
                        true
                    }
                    (ModeData::Relay(data), VoteTarget::Stage { index }) => {
                        let stage = data
                            .stages
                            .get(index)
                            .ok_or("No such stage")?;
                        if stage.author == player_id_owned {
                            return Err("You can't vote for your own stage".to_string());
                        }
                        data.stage_votes.insert(player_id_owned.clone(), index);
                        data.names.is_empty()
                            || data.name_votes.contains_key(&player_id_owned)
                    }
                    (ModeData::Relay(data), VoteTarget::Name { player }) => {
                        if player == player_id_owned {
                            return Err("You can't vote for your own name".to_string());
                        }
                        if !data.names.contains_key(&player) {
                            return Err("That player proposed no name".to_string());
                        }
                        data.name_votes.insert(player_id_owned.clone(), player);
                        data.stage_votes.contains_key(&player_id_owned)
                    }
                    _ => return Err("That vote doesn't fit this round".to_string()),
                };

                if complete {
                    if let Some(p) = room.player_mut(&player_id_owned) {
                        p.voted = true;
                    }
                }
                Ok(if room.all_voted() {
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

/// Running tally for the spectator feed. Author ballots count under the
/// candidate's player id, relay stages under `stage:<index>` and relay
/// names under `name:<author>`.
pub fn vote_counts(room: &Room) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    let Some(round) = room.round.as_ref() else {
        return counts;
    };
    match &round.data {
        ModeData::Capture(data) => {
            for candidate in data.votes.values() {
                *counts.entry(candidate.clone()).or_default() += 1;
            }
        }
        ModeData::Twist(data) => {
            for candidate in data.votes.values() {
                *counts.entry(candidate.clone()).or_default() += 1;
            }
        }
        ModeData::Relay(data) => {
            for index in data.stage_votes.values() {
                *counts.entry(format!("stage:{}", index)).or_default() += 1;
            }
            for candidate in data.name_votes.values() {
                *counts.entry(format!("name:{}", candidate)).or_default() += 1;
            }
        }
    }
    counts
}
