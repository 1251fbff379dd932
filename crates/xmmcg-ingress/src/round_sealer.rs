//! Round sealer: produces the [`SealedRound`] an allocation pass consumes.
//!
//! Sealing freezes the book, orders its open bids by admission sequence,
//! snapshots each bidder's spendable tokens, and computes the input hash.
//! Sealing an already-sealed book yields the same snapshot, which is what
//! makes a failed pass safe to retry.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};
use xmmcg_types::{Bid, ParticipantId, Result, Round, RoundId, RoundKind, SealedRound, Tokens};

use crate::{BidBook, Ledger};

/// Stateless sealer.
pub struct RoundSealer;

impl RoundSealer {
    /// Seal `book` and snapshot it for allocation.
    ///
    /// # Errors
    /// `UnknownParticipant` if a bidder has no ledger account.
    pub fn seal(round: &Round, book: &mut BidBook, ledger: &Ledger) -> Result<SealedRound> {
        let sealed_at = book.seal();

        let mut bids: Vec<Bid> = book.open_bids().cloned().collect();
        bids.sort_by(|a, b| a.sequence.cmp(&b.sequence).then(a.id.cmp(&b.id)));

        let bidders: BTreeSet<ParticipantId> = bids.iter().map(|b| b.bidder).collect();
        let mut spendable = BTreeMap::new();
        for bidder in bidders {
            let entry = ledger.entry(bidder)?;
            // This round's own holds come back before anything is charged.
            let held_here = book.reserved_by(bidder);
            spendable.insert(bidder, entry.available().saturating_add(held_here));
        }

        let input_hash = Self::compute_input_hash(round.id, round.kind, &bids);
        tracing::debug!(
            round = %round.id,
            bids = bids.len(),
            items = book.items().len(),
            input_hash = %hex::encode(input_hash),
            "Round sealed"
        );

        Ok(SealedRound {
            round_id: round.id,
            kind: round.kind,
            bids,
            items: book.items().keys().copied().collect(),
            item_owners: book.items().clone(),
            spendable,
            input_hash,
            sealed_at,
        })
    }

    /// SHA-256 over the round and its ordered bid set.
    ///
    /// Commits to round id, kind, bid count, and each bid's id, bidder,
    /// item, amount, and sequence.
    #[must_use]
    pub fn compute_input_hash(round_id: RoundId, kind: RoundKind, bids: &[Bid]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"xmmcg:round:v1:");
        hasher.update(round_id.0.to_le_bytes());
        hasher.update(match kind {
            RoundKind::Song => [0u8],
            RoundKind::Submission => [1u8],
        });
        hasher.update((bids.len() as u64).to_le_bytes());
        for bid in bids {
            hasher.update(bid.id.0.as_bytes());
            hasher.update(bid.bidder.0.as_bytes());
            hasher.update(bid.item.to_bytes());
            hasher.update(bid.amount.to_le_bytes());
            hasher.update(bid.sequence.to_le_bytes());
        }
        hasher.finalize().into()
    }

    /// Recompute and compare the input hash.
    #[must_use]
    pub fn verify(sealed: &SealedRound) -> bool {
        Self::compute_input_hash(sealed.round_id, sealed.kind, &sealed.bids) == sealed.input_hash
    }
}

/// Total tokens a sealed round could charge `bidder`, given its snapshot.
#[must_use]
pub fn spendable_of(sealed: &SealedRound, bidder: ParticipantId) -> Tokens {
    sealed.spendable.get(&bidder).copied().unwrap_or(0)
}
