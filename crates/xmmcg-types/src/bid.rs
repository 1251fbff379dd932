//! Bid types.
//!
//! A bid is admitted into a round's bid book only after the admission checks
//! and the ledger reservation succeed. After admission it is never re-priced;
//! the only mutation is the `dropped` flag set when the bid loses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BidId, ItemId, ParticipantId, RoundId, Tokens};

/// A sealed bid: (round, bidder, item, amount). Unique per (round, bidder, item).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub round_id: RoundId,
    pub bidder: ParticipantId,
    pub item: ItemId,
    pub amount: Tokens,
    /// Set by the allocation commit when this bid lost.
    pub dropped: bool,
    /// Admission order within the bid book.
    pub sequence: u64,
    pub submitted_at: DateTime<Utc>,
}

impl Bid {
    /// Whether the bid still competes.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.dropped
    }

    /// Earliest-first ordering key: submission time, then admission order.
    #[must_use]
    pub fn arrival_key(&self) -> (DateTime<Utc>, u64) {
        (self.submitted_at, self.sequence)
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Bid {
    pub fn dummy(round_id: RoundId, bidder: ParticipantId, item: ItemId, amount: Tokens) -> Self {
        Self {
            id: BidId::new(),
            round_id,
            bidder,
            item,
            amount,
            dropped: false,
            sequence: 0,
            submitted_at: Utc::now(),
        }
    }

    pub fn dummy_at(
        round_id: RoundId,
        bidder: ParticipantId,
        item: ItemId,
        amount: Tokens,
        sequence: u64,
    ) -> Self {
        let base = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default();
        let offset = i64::try_from(sequence).unwrap_or(0);
        Self {
            id: BidId::new(),
            round_id,
            bidder,
            item,
            amount,
            dropped: false,
            sequence,
            submitted_at: base + chrono::Duration::milliseconds(offset),
        }
    }
}
