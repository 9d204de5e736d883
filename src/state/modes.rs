//! Mode Strategy Set
//!
//! Each mode is one setup algorithm plus cohort rules: who must act in the
//! current phase. Dispatch is by the `GameMode` tag, resolved once at game
//! start and never re-selected mid-game.

use crate::types::*;
use rand::prelude::IndexedRandom;
use rand::seq::SliceRandom;

impl GameMode {
    /// Minimum viable player count, re-checked after every disconnect.
    /// Capture and Twist need a designated player plus at least two others
    /// to make the vote meaningful; a relay chain works with two.
    pub fn min_players(&self) -> usize {
        match self {
            GameMode::Capture => 3,
            GameMode::Twist => 3,
            GameMode::Relay => 2,
        }
    }
}

/// Populate the round's mode data for the connected players. `fallback_prompt`
/// and `twist` come from the content provider and are used when the
/// player-submitted pool has nothing left to offer.
pub(crate) fn setup_round(
    room: &mut Room,
    fallback_prompt: String,
    twist: String,
) -> Result<(), String> {
    let participants = room.participant_ids();
    if participants.is_empty() {
        return Err("No connected players to set up a round for".to_string());
    }

    let round = room.round.as_mut().ok_or("No active round")?;
    let mut rng = rand::rng();

    match round.mode {
        GameMode::Capture => {
            let subject = pick_rotating(&participants, &mut round.prior_subjects, &mut rng);
            let prompt = draw_prompt(round, fallback_prompt, &mut rng);
            round.prior_subjects.push(subject.clone());
            round.data = ModeData::Capture(CaptureData {
                subject,
                prompt,
                artifact: None,
                submissions: Default::default(),
                votes: Default::default(),
            });
        }
        GameMode::Twist => {
            let holder = pick_rotating(&participants, &mut round.prior_holders, &mut rng);
            let prompt = draw_prompt(round, fallback_prompt, &mut rng);
            round.prior_holders.push(holder.clone());
            round.data = ModeData::Twist(TwistData {
                holder,
                prompt,
                twist,
                submissions: Default::default(),
                votes: Default::default(),
            });
        }
        GameMode::Relay => {
            let mut order = participants;
            order.shuffle(&mut rng);
            round.data = ModeData::Relay(RelayData {
                order,
                position: 0,
                stages: Vec::new(),
                names: Default::default(),
                stage_votes: Default::default(),
                name_votes: Default::default(),
            });
        }
    }
    Ok(())
}

/// Pick a player, preferring those not yet chosen this game. Once everyone
/// has had a turn the memory resets and the rotation starts over.
fn pick_rotating(
    participants: &[PlayerId],
    prior: &mut Vec<PlayerId>,
    rng: &mut impl rand::Rng,
) -> PlayerId {
    let fresh: Vec<&PlayerId> = participants
        .iter()
        .filter(|id| !prior.contains(id))
        .collect();
    match fresh.choose(rng) {
        Some(id) => (*id).clone(),
        None => {
            // Everyone has been up; start the rotation over.
            prior.clear();
            participants.choose(rng).cloned().unwrap_or_default()
        }
    }
}

/// Take a random unused prompt from the player pool, flagging it used, or
/// fall back to the provided string when the pool is exhausted.
fn draw_prompt(round: &mut RoundState, fallback: String, rng: &mut impl rand::Rng) -> String {
    let unused: Vec<usize> = round
        .prompt_pool
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.used)
        .map(|(i, _)| i)
        .collect();
    match unused.choose(rng) {
        Some(&i) => {
            round.prompt_pool[i].used = true;
            round.prompt_pool[i].text.clone()
        }
        None => fallback,
    }
}

impl Room {
    /// Who must submit before the submission phase can end early.
    pub fn submission_cohort(&self) -> Vec<PlayerId> {
        let Some(round) = &self.round else {
            return Vec::new();
        };
        match &round.data {
            ModeData::Capture(data) => self
                .participant_ids()
                .into_iter()
                .filter(|id| *id != data.subject)
                .collect(),
            ModeData::Twist(_) => self.participant_ids(),
            ModeData::Relay(data) => match data.order.get(data.position) {
                Some(author) if self.player(author).map(|p| p.connected).unwrap_or(false) => {
                    vec![author.clone()]
                }
                _ => Vec::new(),
            },
        }
    }

    /// Who must vote before the voting phase can end early.
    pub fn voting_cohort(&self) -> Vec<PlayerId> {
        let Some(round) = &self.round else {
            return Vec::new();
        };
        match &round.data {
            // The subject votes too, on their own artifact's fate included.
            ModeData::Capture(_) => self.participant_ids(),
            // The holder is the thing being guessed; they sit voting out.
            ModeData::Twist(data) => self
                .participant_ids()
                .into_iter()
                .filter(|id| *id != data.holder)
                .collect(),
            ModeData::Relay(_) => self.participant_ids(),
        }
    }

    /// Who must propose a name before the naming phase can end early
    /// (Relay only).
    pub fn naming_cohort(&self) -> Vec<PlayerId> {
        match self.round.as_ref().map(|r| &r.data) {
            Some(ModeData::Relay(_)) => self.participant_ids(),
            _ => Vec::new(),
        }
    }
}
