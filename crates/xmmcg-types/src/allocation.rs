//! Allocation results produced by the allocation engines.
//!
//! An [`AllocationResult`] is the immutable record of one item's auction:
//! who won it, at what price, and by which mechanism.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AllocationId, BidId, ItemId, ParticipantId, RoundId, SubmissionId, Tokens};

/// How an item was awarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationMechanism {
    /// Highest bid on the item.
    Won,
    /// Fallback draw for a bidder who lost every auction they entered.
    Random,
}

impl std::fmt::Display for AllocationMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Won => write!(f, "WON"),
            Self::Random => write!(f, "RANDOM"),
        }
    }
}

/// Committed outcome of one item's auction. Unique per (round, item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    /// Derived from (round, item).
    pub id: AllocationId,
    pub round_id: RoundId,
    pub item: ItemId,
    pub winner: ParticipantId,
    pub final_price: Tokens,
    pub mechanism: AllocationMechanism,
    /// The bid that won, for `Won` results.
    pub winning_bid: Option<BidId>,
    pub allocated_at: DateTime<Utc>,
}

impl AllocationResult {
    #[must_use]
    pub fn is_random(&self) -> bool {
        self.mechanism == AllocationMechanism::Random
    }
}

impl std::fmt::Display for AllocationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Allocation[{}] {} -> {} @ {} ({})",
            self.id, self.item, self.winner, self.final_price, self.mechanism,
        )
    }
}

/// A second-half submission the settlement plane must create when a
/// first half is won in a submission round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedContinuation {
    /// The allocation that entitles `winner` to the continuation.
    pub allocation: AllocationId,
    /// The first half being continued.
    pub predecessor: SubmissionId,
    pub winner: ParticipantId,
}
