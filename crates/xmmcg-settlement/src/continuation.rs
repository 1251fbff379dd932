//! Continuation chain: first half → second half.
//!
//! A first half may have at most one successor, and only a first half may
//! be continued, so the chain is at most two hops and can never loop.
//! Both rules are checked when continuations are staged; nothing is linked
//! until the surrounding commit has succeeded.

use std::collections::{BTreeMap, HashMap, HashSet};

use xmmcg_types::{
    AllocationPlan, CompetitionError, ItemId, Result, Submission, SubmissionId,
};

#[derive(Debug, Default)]
pub struct ContinuationChain {
    /// predecessor → successor
    successors: HashMap<SubmissionId, SubmissionId>,
}

impl ContinuationChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the submissions `plan` asks for, without linking them.
    ///
    /// # Errors
    /// - `MissingAllocation` if a planned continuation has no matching award
    /// - `UnknownItem` if its predecessor is not in `predecessors`
    /// - `InconsistentPlan` if the predecessor is itself a continuation
    /// - `SuccessorExists` if the predecessor already has a successor
    pub fn stage(
        &self,
        plan: &AllocationPlan,
        predecessors: &BTreeMap<SubmissionId, Submission>,
    ) -> Result<Vec<Submission>> {
        let mut staged = Vec::with_capacity(plan.continuations.len());
        let mut seen: HashSet<SubmissionId> = HashSet::new();

        for planned in &plan.continuations {
            let item = ItemId::Submission(planned.predecessor);
            let award = plan
                .allocations
                .iter()
                .find(|a| a.id == planned.allocation && a.item == item)
                .ok_or(CompetitionError::MissingAllocation(item))?;
            if award.winner != planned.winner {
                return Err(CompetitionError::InconsistentPlan {
                    reason: format!("{} awarded to a different winner", award.id),
                });
            }

            let predecessor = predecessors
                .get(&planned.predecessor)
                .ok_or(CompetitionError::UnknownItem(item))?;
            if !predecessor.is_first_half() {
                return Err(CompetitionError::InconsistentPlan {
                    reason: format!("{} is not a first half", predecessor.id),
                });
            }
            if self.successors.contains_key(&predecessor.id) || !seen.insert(predecessor.id) {
                return Err(CompetitionError::SuccessorExists(predecessor.id));
            }

            staged.push(Submission::continuation(
                plan.round_id,
                planned.winner,
                predecessor,
                planned.allocation,
            ));
        }
        Ok(staged)
    }

    /// Record staged continuations. Call only after the commit succeeded.
    pub fn link(&mut self, continuations: &[Submission]) {
        for c in continuations {
            if let Some(predecessor) = c.predecessor {
                self.successors.insert(predecessor, c.id);
            }
        }
    }

    #[must_use]
    pub fn successor_of(&self, predecessor: SubmissionId) -> Option<SubmissionId> {
        self.successors.get(&predecessor).copied()
    }

    #[must_use]
    pub fn has_successor(&self, predecessor: SubmissionId) -> bool {
        self.successors.contains_key(&predecessor)
    }
}
