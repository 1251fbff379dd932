//! Result-root hashing for auditability.
//!
//! Every pass over the same sealed round with the same seed must produce
//! the same awards. The `result_root` commits to them so two runs (or an
//! auditor) can compare outcomes without diffing full payloads.

use sha2::{Digest, Sha256};
use xmmcg_types::{AllocationMechanism, AllocationResult};

/// SHA-256 over the ordered allocations.
///
/// Commits to each allocation's id, item, winner, price, mechanism, and
/// winning bid. Timestamps are excluded.
#[must_use]
pub fn compute_result_root(allocations: &[AllocationResult]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"xmmcg:result_root:v1:");
    hasher.update((allocations.len() as u64).to_le_bytes());

    for a in allocations {
        hasher.update(a.id.0.as_bytes());
        hasher.update(a.round_id.0.to_le_bytes());
        hasher.update(a.item.to_bytes());
        hasher.update(a.winner.0.as_bytes());
        hasher.update(a.final_price.to_le_bytes());
        hasher.update(match a.mechanism {
            AllocationMechanism::Won => [0u8],
            AllocationMechanism::Random => [1u8],
        });
        match a.winning_bid {
            Some(bid) => hasher.update(bid.0.as_bytes()),
            None => hasher.update([0u8; 16]),
        }
    }

    hasher.finalize().into()
}

#[must_use]
pub fn verify_result_root(allocations: &[AllocationResult], expected: &[u8; 32]) -> bool {
    compute_result_root(allocations) == *expected
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use xmmcg_types::{AllocationId, ItemId, ParticipantId, RoundId, SongId};

    use super::*;

    fn award(seed: u8, price: u64) -> AllocationResult {
        let item = ItemId::Song(SongId::from_bytes([seed; 16]));
        AllocationResult {
            id: AllocationId::deterministic(RoundId(1), item),
            round_id: RoundId(1),
            item,
            winner: ParticipantId::from_bytes([seed.wrapping_add(1); 16]),
            final_price: price,
            mechanism: AllocationMechanism::Won,
            winning_bid: None,
            allocated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_root_is_stable() {
        assert_eq!(compute_result_root(&[]), compute_result_root(&[]));
    }

    #[test]
    fn price_changes_root() {
        assert_ne!(
            compute_result_root(&[award(1, 10)]),
            compute_result_root(&[award(1, 11)])
        );
    }

    #[test]
    fn order_matters() {
        let (a, b) = (award(1, 10), award(2, 10));
        assert_ne!(
            compute_result_root(&[a.clone(), b.clone()]),
            compute_result_root(&[b, a])
        );
    }

    #[test]
    fn timestamps_do_not_affect_root() {
        let a = award(1, 10);
        let mut b = a.clone();
        b.allocated_at = a.allocated_at + chrono::Duration::seconds(5);
        let root = compute_result_root(&[a]);
        assert!(verify_result_root(&[b], &root));
    }
}
