//! First-price allocation for song rounds.
//!
//! ```text
//! FirstPriceAllocationEngine::allocate(SealedRound) -> AllocationPlan
//! ```
//!
//! A participant may bid on, and win, their own song here. Self-exclusion
//! only applies in submission rounds.

use xmmcg_types::{
    AllocationPlan, CompetitionConfig, CompetitionError, Result, RoundKind, SealedRound,
};

use crate::{AuctionRules, RandomSource, auction::run_auction};

/// Pure deterministic engine: same sealed round and same random draws give
/// the same plan, the same ids, and the same `result_root`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstPriceAllocationEngine {
    rules: AuctionRules,
}

impl FirstPriceAllocationEngine {
    #[must_use]
    pub fn new(rules: AuctionRules) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn from_config(config: &CompetitionConfig) -> Self {
        Self::new(AuctionRules::from_config(config))
    }

    #[must_use]
    pub fn rules(&self) -> &AuctionRules {
        &self.rules
    }

    /// Resolve a sealed song round.
    ///
    /// # Errors
    /// `WrongRoundKind` if `sealed` is not a song round.
    pub fn allocate(
        &self,
        sealed: &SealedRound,
        rng: &mut dyn RandomSource,
    ) -> Result<AllocationPlan> {
        if sealed.kind != RoundKind::Song {
            return Err(CompetitionError::WrongRoundKind {
                round: sealed.round_id,
                expected: RoundKind::Song,
                actual: sealed.kind,
            });
        }
        let plan = run_auction(sealed, &self.rules, rng, false);
        log_plan(&plan, sealed.bids.len());
        Ok(plan)
    }
}

pub(crate) fn log_plan(plan: &AllocationPlan, total_bids: usize) {
    let random = plan.allocations.iter().filter(|a| a.is_random()).count();
    tracing::info!(
        round = %plan.round_id,
        kind = %plan.kind,
        bids = total_bids,
        allocated = plan.allocations.len(),
        random,
        winners = plan.winners_count(),
        unallocated = plan.unallocated.len(),
        input_hash = %hex::encode(plan.input_hash),
        result_root = %hex::encode(plan.result_root),
        "Allocation pass complete"
    );
}
