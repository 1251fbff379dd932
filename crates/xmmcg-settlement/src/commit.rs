//! All-or-nothing round commit.
//!
//! Takes an [`AllocationPlan`] and applies it to the round, its bid book,
//! and the ledger as one unit:
//!
//! 1. Check idempotency and round status
//! 2. Check the plan against the book (every open bid is won or dropped,
//!    every winning price equals its bid)
//! 3. Stage continuation submissions
//! 4. Verify token conservation on the ledger as it stands
//! 5. Apply every ledger operation in one batch: releases, then commits,
//!    then fallback debits
//! 6. Mark losing bids dropped, complete the round, link continuations
//!
//! Steps 1 through 5 can fail and leave nothing behind: the round stays
//! `Active` with its book sealed, so the same pass can run again. Step 6
//! cannot fail. Conservation is checked once more afterwards; a violation
//! there is logged as an alarm but the commit stands.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use xmmcg_ingress::{BidBook, Ledger, LedgerOp};
use xmmcg_types::{
    AllocationPlan, AllocationResult, Bid, BidId, CompetitionError, Result, Round, RoundId,
    RoundStatus, Submission, SubmissionId, Tokens,
};

use crate::{ContinuationChain, IdempotencyGuard, TokenConservation};

/// What a successful commit changed.
#[derive(Debug, Clone)]
pub struct SettlementReceipt {
    pub round_id: RoundId,
    pub allocations: Vec<AllocationResult>,
    /// Second halves created by this commit.
    pub continuations: Vec<Submission>,
    pub dropped_bids: usize,
    /// Tokens moved from reservations to debits.
    pub committed: Tokens,
    /// Tokens debited for fallback awards.
    pub fallback_debited: Tokens,
    /// Tokens whose reservations were released.
    pub released: Tokens,
    pub result_root: [u8; 32],
    pub committed_at: DateTime<Utc>,
}

impl SettlementReceipt {
    #[must_use]
    pub fn total_debited(&self) -> Tokens {
        self.committed + self.fallback_debited
    }
}

/// Commits allocation plans. One per competition.
#[derive(Debug, Default)]
pub struct RoundSettler {
    idempotency: IdempotencyGuard,
    chain: ContinuationChain,
    supply: TokenConservation,
}

impl RoundSettler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Note tokens granted outside a commit (registration).
    pub fn record_grant(&mut self, amount: Tokens) {
        self.supply.record_grant(amount);
    }

    /// Commit `plan` to `round`.
    ///
    /// `predecessors` must hold every first half the plan continues.
    ///
    /// # Errors
    /// - `RoundAlreadyCompleted` if the round was already committed
    /// - `WrongRoundStatus` if the round is not active
    /// - `InconsistentPlan`, `MissingAllocation`, `SuccessorExists` if the
    ///   plan does not fit the round
    /// - `ConservationViolation` if the ledger was already out of balance
    /// - any ledger error from the batch
    pub fn settle(
        &mut self,
        round: &mut Round,
        book: &mut BidBook,
        ledger: &Ledger,
        plan: &AllocationPlan,
        predecessors: &BTreeMap<SubmissionId, Submission>,
    ) -> Result<SettlementReceipt> {
        match self.try_settle(round, book, ledger, plan, predecessors) {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                tracing::warn!(
                    round = %plan.round_id,
                    code = %err,
                    "Round commit aborted, nothing applied"
                );
                Err(err)
            }
        }
    }

    fn try_settle(
        &mut self,
        round: &mut Round,
        book: &mut BidBook,
        ledger: &Ledger,
        plan: &AllocationPlan,
        predecessors: &BTreeMap<SubmissionId, Submission>,
    ) -> Result<SettlementReceipt> {
        // 1. Idempotency and status.
        self.idempotency.ensure_fresh(plan)?;
        round.ensure_status(RoundStatus::Active)?;
        if plan.round_id != round.id || book.round_id() != round.id {
            return Err(inconsistent(format!(
                "plan for {} applied to {}",
                plan.round_id, round.id
            )));
        }
        let mut completed = round.clone();
        completed.complete()?;

        // 2. Plan against book.
        let ops = Self::ledger_ops(book, plan)?;

        // 3. Continuations.
        let continuations = self.chain.stage(plan, predecessors)?;

        // 4. Conservation before anything moves.
        self.supply.verify(ledger)?;

        // 5. Ledger.
        ledger.apply_batch(&ops.ops)?;

        // 6. Infallible from here on.
        let dropped = book.mark_dropped(&plan.dropped_bids);
        *round = completed;
        self.chain.link(&continuations);
        self.idempotency.record(plan);
        self.supply.record_debit(ops.committed + ops.fallback_debited);

        if let Err(err) = self.supply.verify(ledger) {
            tracing::error!(round = %round.id, %err, "Token conservation violated after commit");
        }

        tracing::info!(
            round = %round.id,
            allocations = plan.allocations.len(),
            continuations = continuations.len(),
            dropped,
            committed = ops.committed,
            fallback_debited = ops.fallback_debited,
            released = ops.released,
            result_root = %hex::encode(plan.result_root),
            "Round committed"
        );

        Ok(SettlementReceipt {
            round_id: round.id,
            allocations: plan.allocations.clone(),
            continuations,
            dropped_bids: dropped,
            committed: ops.committed,
            fallback_debited: ops.fallback_debited,
            released: ops.released,
            result_root: plan.result_root,
            committed_at: Utc::now(),
        })
    }

    /// Translate the plan into ledger operations, checking it covers the
    /// book exactly.
    fn ledger_ops(book: &BidBook, plan: &AllocationPlan) -> Result<PlannedOps> {
        let open: HashMap<BidId, &Bid> = book.open_bids().map(|b| (b.id, b)).collect();

        let mut releases = Vec::new();
        let mut commits = Vec::new();
        let mut debits = Vec::new();
        let mut planned = PlannedOps::default();

        for id in &plan.dropped_bids {
            let bid = open
                .get(id)
                .ok_or_else(|| inconsistent(format!("dropped {id} is not an open bid")))?;
            planned.released += bid.amount;
            releases.push(LedgerOp::Release {
                participant: bid.bidder,
                amount: bid.amount,
            });
        }

        for award in &plan.allocations {
            match award.winning_bid {
                Some(id) => {
                    let bid = open
                        .get(&id)
                        .ok_or_else(|| inconsistent(format!("winning {id} is not an open bid")))?;
                    if bid.bidder != award.winner
                        || bid.amount != award.final_price
                        || bid.item != award.item
                    {
                        return Err(inconsistent(format!("{} does not match {id}", award.id)));
                    }
                    planned.committed += bid.amount;
                    commits.push(LedgerOp::Commit {
                        participant: award.winner,
                        amount: award.final_price,
                    });
                }
                None => {
                    planned.fallback_debited += award.final_price;
                    debits.push(LedgerOp::Debit {
                        participant: award.winner,
                        amount: award.final_price,
                    });
                }
            }
        }

        let covered = plan.dropped_bids.len() + commits.len();
        if covered != open.len() || plan.winning_bids.len() != commits.len() {
            return Err(inconsistent(format!(
                "plan covers {covered} of {} open bids",
                open.len()
            )));
        }

        planned.ops = releases;
        planned.ops.append(&mut commits);
        planned.ops.append(&mut debits);
        Ok(planned)
    }

    #[must_use]
    pub fn is_committed(&self, round: RoundId) -> bool {
        self.idempotency.is_committed(round)
    }

    #[must_use]
    pub fn chain(&self) -> &ContinuationChain {
        &self.chain
    }

    /// Run the conservation check on demand.
    pub fn verify_supply(&self, ledger: &Ledger) -> Result<()> {
        self.supply.verify(ledger)
    }
}

#[derive(Debug, Default)]
struct PlannedOps {
    ops: Vec<LedgerOp>,
    committed: Tokens,
    fallback_debited: Tokens,
    released: Tokens,
}

fn inconsistent(reason: String) -> CompetitionError {
    CompetitionError::InconsistentPlan { reason }
}

#[cfg(test)]
mod tests {
    use xmmcg_types::{
        AllocationId, AllocationMechanism, ItemId, ParticipantId, RoundKind, SongId,
    };

    use super::*;

    struct Setup {
        round: Round,
        book: BidBook,
        ledger: Ledger,
        settler: RoundSettler,
        song: ItemId,
    }

    fn setup() -> Setup {
        let mut round = Round::new(RoundId(1), "songs", RoundKind::Song, None);
        round.activate().unwrap();
        let song = ItemId::Song(SongId::new());
        let book = BidBook::new(round.id, BTreeMap::from([(song, ParticipantId::new())]));
        Setup {
            round,
            book,
            ledger: Ledger::new(),
            settler: RoundSettler::new(),
            song,
        }
    }

    fn fund(s: &mut Setup, p: ParticipantId, tokens: Tokens) {
        s.ledger.open_account(p, tokens).unwrap();
        s.settler.record_grant(tokens);
    }

    fn won(round: RoundId, bid: &Bid) -> AllocationResult {
        AllocationResult {
            id: AllocationId::deterministic(round, bid.item),
            round_id: round,
            item: bid.item,
            winner: bid.bidder,
            final_price: bid.amount,
            mechanism: AllocationMechanism::Won,
            winning_bid: Some(bid.id),
            allocated_at: Utc::now(),
        }
    }

    fn plan(round: RoundId, allocations: Vec<AllocationResult>, dropped: Vec<BidId>) -> AllocationPlan {
        AllocationPlan {
            round_id: round,
            kind: RoundKind::Song,
            winning_bids: allocations.iter().filter_map(|a| a.winning_bid).collect(),
            allocations,
            dropped_bids: dropped,
            unallocated: vec![],
            continuations: vec![],
            input_hash: [0; 32],
            result_root: [1; 32],
        }
    }

    #[test]
    fn commit_debits_winner_releases_loser() {
        let mut s = setup();
        let (a, b) = (ParticipantId::new(), ParticipantId::new());
        fund(&mut s, a, 100);
        fund(&mut s, b, 100);
        s.ledger.reserve(a, 50).unwrap();
        s.ledger.reserve(b, 30).unwrap();
        let bid_a = s.book.push(a, s.song, 50).unwrap();
        let bid_b = s.book.push(b, s.song, 30).unwrap();
        s.book.seal();

        let p = plan(s.round.id, vec![won(s.round.id, &bid_a)], vec![bid_b.id]);
        let receipt = s
            .settler
            .settle(&mut s.round, &mut s.book, &s.ledger, &p, &BTreeMap::new())
            .unwrap();

        assert_eq!(receipt.committed, 50);
        assert_eq!(receipt.released, 30);
        assert_eq!(receipt.dropped_bids, 1);
        assert_eq!(s.ledger.balance(a).unwrap(), 50);
        assert_eq!(s.ledger.entry(b).unwrap().available(), 100);
        assert!(s.round.is_completed());
        assert!(s.book.bids()[1].dropped);
    }

    #[test]
    fn second_commit_rejected_without_changes() {
        let mut s = setup();
        let a = ParticipantId::new();
        fund(&mut s, a, 100);
        s.ledger.reserve(a, 10).unwrap();
        let bid = s.book.push(a, s.song, 10).unwrap();
        let p = plan(s.round.id, vec![won(s.round.id, &bid)], vec![]);
        s.settler
            .settle(&mut s.round, &mut s.book, &s.ledger, &p, &BTreeMap::new())
            .unwrap();

        let err = s
            .settler
            .settle(&mut s.round, &mut s.book, &s.ledger, &p, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, CompetitionError::RoundAlreadyCompleted(_)));
        assert_eq!(s.ledger.balance(a).unwrap(), 90);
    }

    #[test]
    fn failing_debit_aborts_whole_round() {
        let mut s = setup();
        let (a, broke) = (ParticipantId::new(), ParticipantId::new());
        fund(&mut s, a, 100);
        fund(&mut s, broke, 0);
        s.ledger.reserve(a, 40).unwrap();
        let bid = s.book.push(a, s.song, 40).unwrap();

        let other = ItemId::Song(SongId::new());
        let fallback = AllocationResult {
            id: AllocationId::deterministic(s.round.id, other),
            round_id: s.round.id,
            item: other,
            winner: broke,
            final_price: 1,
            mechanism: AllocationMechanism::Random,
            winning_bid: None,
            allocated_at: Utc::now(),
        };
        let p = plan(s.round.id, vec![won(s.round.id, &bid), fallback], vec![]);
        let err = s
            .settler
            .settle(&mut s.round, &mut s.book, &s.ledger, &p, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, CompetitionError::BalanceUnderflow { .. }));

        // Nothing applied; the round can be retried.
        assert_eq!(s.ledger.balance(a).unwrap(), 100);
        assert_eq!(s.ledger.entry(a).unwrap().reserved, 40);
        assert_eq!(s.round.status, RoundStatus::Active);
        assert!(!s.settler.is_committed(s.round.id));

        let retry = plan(s.round.id, vec![won(s.round.id, &bid)], vec![]);
        s.settler
            .settle(&mut s.round, &mut s.book, &s.ledger, &retry, &BTreeMap::new())
            .unwrap();
        assert_eq!(s.ledger.balance(a).unwrap(), 60);
    }

    #[test]
    fn plan_missing_a_bid_is_inconsistent() {
        let mut s = setup();
        let a = ParticipantId::new();
        fund(&mut s, a, 100);
        s.ledger.reserve(a, 10).unwrap();
        s.book.push(a, s.song, 10).unwrap();
        let p = plan(s.round.id, vec![], vec![]);
        let err = s
            .settler
            .settle(&mut s.round, &mut s.book, &s.ledger, &p, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, CompetitionError::InconsistentPlan { .. }));
        assert_eq!(s.ledger.entry(a).unwrap().reserved, 10);
    }

    #[test]
    fn inactive_round_rejected() {
        let mut s = setup();
        let mut pending = Round::new(RoundId(1), "songs", RoundKind::Song, None);
        let p = plan(RoundId(1), vec![], vec![]);
        let err = s
            .settler
            .settle(&mut pending, &mut s.book, &s.ledger, &p, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, CompetitionError::WrongRoundStatus { .. }));
    }

    #[test]
    fn unbalanced_ledger_aborts_before_anything_moves() {
        let mut s = setup();
        let a = ParticipantId::new();
        // Opened without telling the settler about the grant.
        s.ledger.open_account(a, 100).unwrap();
        s.ledger.reserve(a, 20).unwrap();
        let bid = s.book.push(a, s.song, 20).unwrap();
        let p = plan(s.round.id, vec![won(s.round.id, &bid)], vec![]);

        let err = s
            .settler
            .settle(&mut s.round, &mut s.book, &s.ledger, &p, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, CompetitionError::ConservationViolation { .. }));
        assert_eq!(s.round.status, RoundStatus::Active);
        assert_eq!(s.ledger.balance(a).unwrap(), 100);
        assert_eq!(s.ledger.entry(a).unwrap().reserved, 20);
        assert!(!s.settler.is_committed(s.round.id));

        s.settler.record_grant(100);
        let receipt = s
            .settler
            .settle(&mut s.round, &mut s.book, &s.ledger, &p, &BTreeMap::new())
            .unwrap();
        assert_eq!(receipt.committed, 20);
        assert!(s.round.is_completed());
    }
}
