//! Round lifecycle types.
//!
//! Each round moves through three phases, never backwards:
//! **PENDING → ACTIVE → COMPLETED**
//!
//! While ACTIVE the round's bid book admits bids. Closing the round seals the
//! book; the allocation pass then runs over the sealed snapshot and, on commit,
//! moves the round to COMPLETED.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AllocationResult, Bid, BidId, CompetitionError, ItemId, ParticipantId, PlannedContinuation,
    Result, RoundId, Tokens,
};

/// Lifecycle status of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundStatus {
    /// Created, not yet accepting bids.
    Pending,
    /// Accepting bids until closed.
    Active,
    /// Allocation committed. Immutable from here on.
    Completed,
}

impl RoundStatus {
    /// Transitions are monotonic: `Pending → Active → Completed`.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Active) | (Self::Active, Self::Completed)
        )
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// What a round auctions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundKind {
    /// First round: songs.
    Song,
    /// Second round: first-half submissions from a completed song round.
    Submission,
}

impl fmt::Display for RoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Song => write!(f, "SONG"),
            Self::Submission => write!(f, "SUBMISSION"),
        }
    }
}

/// One bounded auction epoch over a fixed item pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub name: String,
    pub kind: RoundKind,
    pub status: RoundStatus,
    /// For submission rounds: the song round whose first halves are auctioned.
    pub parent: Option<RoundId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Round {
    /// A new pending round.
    #[must_use]
    pub fn new(id: RoundId, name: impl Into<String>, kind: RoundKind, parent: Option<RoundId>) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            status: RoundStatus::Pending,
            parent,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RoundStatus::Active
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == RoundStatus::Completed
    }

    /// Fail unless the round is in `expected` status.
    pub fn ensure_status(&self, expected: RoundStatus) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else if self.status == RoundStatus::Completed {
            Err(CompetitionError::RoundAlreadyCompleted(self.id))
        } else {
            Err(CompetitionError::WrongRoundStatus {
                round: self.id,
                expected,
                actual: self.status,
            })
        }
    }

    /// Fail unless the round auctions `expected` items.
    pub fn ensure_kind(&self, expected: RoundKind) -> Result<()> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(CompetitionError::WrongRoundKind {
                round: self.id,
                expected,
                actual: self.kind,
            })
        }
    }

    /// `Pending → Active`.
    pub fn activate(&mut self) -> Result<()> {
        self.transition(RoundStatus::Active)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `Active → Completed`.
    pub fn complete(&mut self) -> Result<()> {
        self.transition(RoundStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, target: RoundStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            if self.status == RoundStatus::Completed {
                return Err(CompetitionError::RoundAlreadyCompleted(self.id));
            }
            return Err(CompetitionError::WrongRoundStatus {
                round: self.id,
                expected: match target {
                    RoundStatus::Pending | RoundStatus::Active => RoundStatus::Pending,
                    RoundStatus::Completed => RoundStatus::Active,
                },
                actual: self.status,
            });
        }
        self.status = target;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SealedRound: the immutable input to the allocation engines
// ---------------------------------------------------------------------------

/// A frozen snapshot of one round at close time.
///
/// Allocation depends only on this snapshot: every bid admitted before the
/// seal, and nothing after it. The `input_hash` commits to the exact bid set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedRound {
    pub round_id: RoundId,
    pub kind: RoundKind,
    /// Open bids in admission order.
    pub bids: Vec<Bid>,
    /// The round's item pool, sorted.
    pub items: Vec<ItemId>,
    /// Owner of each item, used for self-exclusion.
    pub item_owners: BTreeMap<ItemId, ParticipantId>,
    /// Tokens each bidder could spend in this round once their own
    /// reservations for it are released.
    pub spendable: BTreeMap<ParticipantId, Tokens>,
    /// SHA-256 over the round id and the ordered bid set.
    pub input_hash: [u8; 32],
    pub sealed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// AllocationPlan: the deterministic output of an allocation engine
// ---------------------------------------------------------------------------

/// What an allocation pass decided, before anything is committed.
///
/// Given the same [`SealedRound`] and the same random seed, every pass
/// produces the same plan and the same `result_root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub round_id: RoundId,
    pub kind: RoundKind,
    /// One result per awarded item, sorted by item.
    pub allocations: Vec<AllocationResult>,
    /// Bids that won their item. Their reservations become debits.
    pub winning_bids: Vec<BidId>,
    /// Every other bid. Their reservations are released.
    pub dropped_bids: Vec<BidId>,
    /// Items nobody was awarded.
    pub unallocated: Vec<ItemId>,
    /// Continuations to materialize. Empty for song rounds.
    pub continuations: Vec<PlannedContinuation>,
    /// Propagated from [`SealedRound::input_hash`].
    pub input_hash: [u8; 32],
    /// SHA-256 over the ordered allocations.
    pub result_root: [u8; 32],
}

impl AllocationPlan {
    /// Distinct participants awarded at least one item.
    #[must_use]
    pub fn winners_count(&self) -> usize {
        let mut winners: Vec<ParticipantId> = self.allocations.iter().map(|a| a.winner).collect();
        winners.sort_unstable();
        winners.dedup();
        winners.len()
    }

    /// The allocation for `item`, if one was made.
    #[must_use]
    pub fn allocation_for(&self, item: ItemId) -> Option<&AllocationResult> {
        self.allocations.iter().find(|a| a.item == item)
    }
}
