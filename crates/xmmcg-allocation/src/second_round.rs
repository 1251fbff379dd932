//! Allocation for submission rounds.
//!
//! Same two passes as the song round, plus self-exclusion: a bid on a
//! first half its bidder owns never competes, and the fallback draw never
//! hands a half back to its owner. Every award also yields a
//! [`PlannedContinuation`], the second-half submission the settlement plane
//! creates in the same commit.

use xmmcg_types::{
    AllocationPlan, CompetitionConfig, CompetitionError, ItemId, PlannedContinuation, Result,
    RoundKind, SealedRound,
};

use crate::{AuctionRules, RandomSource, auction::run_auction, first_round::log_plan};

#[derive(Debug, Clone, Copy, Default)]
pub struct SecondRoundAllocationEngine {
    rules: AuctionRules,
}

impl SecondRoundAllocationEngine {
    #[must_use]
    pub fn new(rules: AuctionRules) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn from_config(config: &CompetitionConfig) -> Self {
        Self::new(AuctionRules::from_config(config))
    }

    /// Resolve a sealed submission round and plan its continuations.
    ///
    /// # Errors
    /// `WrongRoundKind` if `sealed` is not a submission round.
    pub fn allocate(
        &self,
        sealed: &SealedRound,
        rng: &mut dyn RandomSource,
    ) -> Result<AllocationPlan> {
        if sealed.kind != RoundKind::Submission {
            return Err(CompetitionError::WrongRoundKind {
                round: sealed.round_id,
                expected: RoundKind::Submission,
                actual: sealed.kind,
            });
        }
        let mut plan = run_auction(sealed, &self.rules, rng, true);
        plan.continuations = plan
            .allocations
            .iter()
            .filter_map(|a| match a.item {
                ItemId::Submission(predecessor) => Some(PlannedContinuation {
                    allocation: a.id,
                    predecessor,
                    winner: a.winner,
                }),
                ItemId::Song(_) => None,
            })
            .collect();
        log_plan(&plan, sealed.bids.len());
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use xmmcg_types::{Bid, ParticipantId, RoundId, SubmissionId, Tokens};

    use super::*;
    use crate::{FirstPick, SeededRandom};

    struct Halves {
        items: Vec<ItemId>,
        owners: Vec<ParticipantId>,
    }

    fn halves(n: usize) -> Halves {
        let mut pairs: Vec<(ItemId, ParticipantId)> = (0..n)
            .map(|_| (ItemId::Submission(SubmissionId::new()), ParticipantId::new()))
            .collect();
        pairs.sort();
        Halves {
            items: pairs.iter().map(|(i, _)| *i).collect(),
            owners: pairs.iter().map(|(_, o)| *o).collect(),
        }
    }

    fn submission_round(h: &Halves, bids: Vec<Bid>) -> SealedRound {
        let mut spendable: BTreeMap<ParticipantId, Tokens> = BTreeMap::new();
        for b in &bids {
            spendable.insert(b.bidder, 100);
        }
        SealedRound {
            round_id: RoundId(2),
            kind: RoundKind::Submission,
            bids,
            items: h.items.clone(),
            item_owners: h.items.iter().copied().zip(h.owners.iter().copied()).collect(),
            spendable,
            input_hash: [0; 32],
            sealed_at: Utc::now(),
        }
    }

    #[test]
    fn win_plans_continuation() {
        let h = halves(2);
        let bidder = h.owners[1];
        let bid = Bid::dummy_at(RoundId(2), bidder, h.items[0], 40, 0);
        let plan = SecondRoundAllocationEngine::default()
            .allocate(&submission_round(&h, vec![bid]), &mut FirstPick)
            .unwrap();

        assert_eq!(plan.continuations.len(), 1);
        let c = plan.continuations[0];
        assert_eq!(Some(c.predecessor), h.items[0].as_submission());
        assert_eq!(c.winner, bidder);
        assert_eq!(c.allocation, plan.allocations[0].id);
    }

    #[test]
    fn self_bid_never_wins() {
        let h = halves(1);
        let owner = h.owners[0];
        let self_bid = Bid::dummy_at(RoundId(2), owner, h.items[0], 99, 0);
        let plan = SecondRoundAllocationEngine::default()
            .allocate(&submission_round(&h, vec![self_bid.clone()]), &mut FirstPick)
            .unwrap();
        assert!(plan.allocations.is_empty());
        assert_eq!(plan.dropped_bids, vec![self_bid.id]);
        assert_eq!(plan.unallocated, h.items);
    }

    #[test]
    fn fallback_never_returns_own_half() {
        // x and y both bid on the third half; y loses.
        let h = halves(3);
        let (x, y) = (h.owners[0], h.owners[1]);
        let bids = vec![
            Bid::dummy_at(RoundId(2), x, h.items[2], 30, 0),
            Bid::dummy_at(RoundId(2), y, h.items[2], 20, 1),
        ];
        let sealed = submission_round(&h, bids);
        for seed in 0..16 {
            let plan = SecondRoundAllocationEngine::default()
                .allocate(&sealed, &mut SeededRandom::new(seed))
                .unwrap();
            for a in &plan.allocations {
                assert_ne!(Some(a.winner), sealed.item_owners.get(&a.item).copied());
            }
            // y lost and can only draw x's half.
            let drawn = plan.allocations.iter().find(|a| a.is_random()).unwrap();
            assert_eq!(drawn.winner, y);
            assert_eq!(drawn.item, h.items[0]);
            assert_eq!(plan.continuations.len(), 2);
        }
    }

    #[test]
    fn rejects_song_round() {
        let h = halves(0);
        let mut sealed = submission_round(&h, vec![]);
        sealed.kind = RoundKind::Song;
        assert!(
            SecondRoundAllocationEngine::default()
                .allocate(&sealed, &mut FirstPick)
                .is_err()
        );
    }
}
