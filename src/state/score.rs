//! Scoring Engine
//!
//! Deterministic and order-independent given the final tallies. Winners are
//! found by iterating candidates in stable room order with a strict
//! comparison, so ties go to whichever candidate reached the count first —
//! never re-randomized.

use crate::types::*;
use std::collections::HashMap;

const CAPTURE_WINNER: u32 = 100;
const CAPTURE_RUNNER_UP: u32 = 50;
const TWIST_FOOLED: u32 = 50;
const TWIST_CORRECT_GUESS: u32 = 75;
const RELAY_BEST_STAGE: u32 = 150;
const RELAY_BEST_NAME: u32 = 100;
const PARTICIPATION: u32 = 25;

/// Compute the round's point awards from the final votes and submissions
/// and apply them to player scores. The awards stay on the round for the
/// reveal display.
pub(crate) fn score_round(room: &mut Room) {
    let awards = match room.round.as_ref().map(|r| &r.data) {
        Some(ModeData::Capture(data)) => score_capture(room, data),
        Some(ModeData::Twist(data)) => score_twist(data),
        Some(ModeData::Relay(data)) => score_relay(room, data),
        None => Vec::new(),
    };
    apply_awards(room, awards);
}

pub(crate) fn apply_awards(room: &mut Room, awards: Vec<PointAward>) {
    for award in &awards {
        if let Some(player) = room.player_mut(&award.player) {
            player.score += award.points;
        }
    }
    if let Some(round) = room.round.as_mut() {
        round.awards = awards;
    }
}

fn score_capture(room: &Room, data: &CaptureData) -> Vec<PointAward> {
    let mut counts: HashMap<&PlayerId, u32> = HashMap::new();
    for target in data.votes.values() {
        *counts.entry(target).or_insert(0) += 1;
    }

    // Submitters in stable room order.
    let submitters: Vec<&PlayerId> = room
        .players
        .iter()
        .filter(|p| data.submissions.contains_key(&p.id))
        .map(|p| &p.id)
        .collect();

    let mut ranked: Vec<(&PlayerId, u32)> = submitters
        .iter()
        .map(|id| (*id, counts.get(id).copied().unwrap_or(0)))
        .collect();
    // Stable sort keeps room order among equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut awards = Vec::new();
    if let Some((winner, _)) = ranked.first() {
        awards.push(PointAward {
            player: (*winner).clone(),
            points: CAPTURE_WINNER,
            reason: "most votes".to_string(),
        });
    }
    if let Some((second, _)) = ranked.get(1) {
        awards.push(PointAward {
            player: (*second).clone(),
            points: CAPTURE_RUNNER_UP,
            reason: "runner-up".to_string(),
        });
    }
    for id in &submitters {
        awards.push(PointAward {
            player: (*id).clone(),
            points: PARTICIPATION,
            reason: "participation".to_string(),
        });
    }
    awards
}

fn score_twist(data: &TwistData) -> Vec<PointAward> {
    let mut awards = Vec::new();
    for (voter, guess) in &data.votes {
        if *guess == data.holder {
            awards.push(PointAward {
                player: voter.clone(),
                points: TWIST_CORRECT_GUESS,
                reason: "spotted the twist".to_string(),
            });
        } else {
            awards.push(PointAward {
                player: data.holder.clone(),
                points: TWIST_FOOLED,
                reason: "fooled a voter".to_string(),
            });
        }
    }
    let mut submitters: Vec<&PlayerId> = data.submissions.keys().collect();
    submitters.sort();
    for id in submitters {
        awards.push(PointAward {
            player: id.clone(),
            points: PARTICIPATION,
            reason: "participation".to_string(),
        });
    }
    awards
}

fn score_relay(room: &Room, data: &RelayData) -> Vec<PointAward> {
    let mut awards = Vec::new();

    // Best stage: count votes per stage index, first stage to reach the top
    // count wins.
    let mut stage_counts: HashMap<usize, u32> = HashMap::new();
    for index in data.stage_votes.values() {
        *stage_counts.entry(*index).or_insert(0) += 1;
    }
    let mut best: Option<(usize, u32)> = None;
    for index in 0..data.stages.len() {
        let count = stage_counts.get(&index).copied().unwrap_or(0);
        if best.map(|(_, c)| count > c).unwrap_or(true) {
            best = Some((index, count));
        }
    }
    if let Some((index, _)) = best {
        awards.push(PointAward {
            player: data.stages[index].author.clone(),
            points: RELAY_BEST_STAGE,
            reason: format!("best stage ({})", index + 1),
        });
    }

    // Best name: count votes per name author, room order breaks ties.
    let mut name_counts: HashMap<&PlayerId, u32> = HashMap::new();
    for target in data.name_votes.values() {
        *name_counts.entry(target).or_insert(0) += 1;
    }
    let mut best_name: Option<(&PlayerId, u32)> = None;
    for player in &room.players {
        if !data.names.contains_key(&player.id) {
            continue;
        }
        let count = name_counts.get(&player.id).copied().unwrap_or(0);
        if best_name.map(|(_, c)| count > c).unwrap_or(true) {
            best_name = Some((&player.id, count));
        }
    }
    if let Some((author, _)) = best_name {
        awards.push(PointAward {
            player: author.clone(),
            points: RELAY_BEST_NAME,
            reason: "best name".to_string(),
        });
    }

    // Every player who authored any stage, once.
    let mut stage_authors: Vec<&PlayerId> = Vec::new();
    for player in &room.players {
        if data.stages.iter().any(|s| s.author == player.id) {
            stage_authors.push(&player.id);
        }
    }
    for author in stage_authors {
        awards.push(PointAward {
            player: author.clone(),
            points: PARTICIPATION,
            reason: "participation".to_string(),
        });
    }
    awards
}
