//! Commit idempotency guard: each round is committed at most once.
//!
//! A second commit for the same round fails with
//! [`CompetitionError::RoundAlreadyCompleted`], and an allocation id that
//! was already committed can never be committed again, even under a
//! different round.

use std::collections::HashSet;

use xmmcg_types::{AllocationId, AllocationPlan, CompetitionError, Result, RoundId};

#[derive(Debug, Default)]
pub struct IdempotencyGuard {
    rounds: HashSet<RoundId>,
    allocations: HashSet<AllocationId>,
}

impl IdempotencyGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail if any part of `plan` was already committed.
    pub fn ensure_fresh(&self, plan: &AllocationPlan) -> Result<()> {
        if self.rounds.contains(&plan.round_id) {
            return Err(CompetitionError::RoundAlreadyCompleted(plan.round_id));
        }
        if let Some(dup) = plan
            .allocations
            .iter()
            .find(|a| self.allocations.contains(&a.id))
        {
            return Err(CompetitionError::InconsistentPlan {
                reason: format!("{} was already committed", dup.id),
            });
        }
        Ok(())
    }

    /// Record a committed plan. Call only after the commit succeeded.
    pub fn record(&mut self, plan: &AllocationPlan) {
        self.rounds.insert(plan.round_id);
        self.allocations
            .extend(plan.allocations.iter().map(|a| a.id));
    }

    #[must_use]
    pub fn is_committed(&self, round: RoundId) -> bool {
        self.rounds.contains(&round)
    }

    /// Number of committed rounds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}
