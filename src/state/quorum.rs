//! Submission/Vote Aggregator
//!
//! Quorum detection over the cohort the active mode requires to act. An
//! empty cohort never counts as quorum; otherwise a phase could finish in
//! zero time the moment every eligible actor disconnects.

use crate::types::*;

fn cohort_complete(room: &Room, cohort: &[PlayerId], acted: impl Fn(&Player) -> bool) -> bool {
    !cohort.is_empty()
        && cohort
            .iter()
            .all(|id| room.player(id).map(&acted).unwrap_or(false))
}

impl Room {
    /// True when every member of the submission cohort has submitted.
    pub fn all_submitted(&self) -> bool {
        let cohort = self.submission_cohort();
        cohort_complete(self, &cohort, |p| p.submitted)
    }

    /// True when every member of the voting cohort has voted.
    pub fn all_voted(&self) -> bool {
        let cohort = self.voting_cohort();
        cohort_complete(self, &cohort, |p| p.voted)
    }

    /// True when every member of the naming cohort has proposed a name
    /// (Relay only; the `submitted` flag is reused for naming).
    pub fn all_named(&self) -> bool {
        let cohort = self.naming_cohort();
        cohort_complete(self, &cohort, |p| p.submitted)
    }

    /// True when every connected player has seeded at least one prompt.
    pub fn all_prompted(&self) -> bool {
        let Some(round) = &self.round else {
            return false;
        };
        let cohort = self.participant_ids();
        !cohort.is_empty()
            && cohort.iter().all(|id| {
                round
                    .prompt_pool
                    .iter()
                    .any(|entry| entry.author == *id)
            })
    }
}
