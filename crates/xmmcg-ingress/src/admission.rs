//! Bid admission gate.
//!
//! Every bid passes through [`BidAdmission::admit`] before it reaches a
//! book. The checks run in a fixed order and the first failure wins:
//!
//! 1. round is `Active` and its book is not sealed
//! 2. item belongs to the round's pool
//! 3. bidder does not own the item (submission rounds only)
//! 4. amount within `min_bid..=max_bid`
//! 5. no earlier bid by this bidder on this item
//! 6. open-bid cardinality below the limit, not counting this item
//! 7. the ledger can reserve the amount
//!
//! Checks 5 through 7 and the book insert run while the bidder's ledger
//! account is locked, so two concurrent bids from the same participant
//! cannot both pass against a stale balance. A rejection leaves both the
//! book and the ledger untouched.

use xmmcg_types::{
    Bid, CompetitionConfig, CompetitionError, ItemId, ParticipantId, Result, Round, RoundKind,
    RoundStatus, Tokens,
};

use crate::{BidBook, Ledger, LedgerOp};

/// Limits applied to every incoming bid.
#[derive(Debug, Clone, Copy)]
pub struct BidAdmission {
    min_bid: Tokens,
    max_bid: Tokens,
    max_open_bids: usize,
}

impl BidAdmission {
    #[must_use]
    pub fn new(min_bid: Tokens, max_bid: Tokens, max_open_bids: usize) -> Self {
        Self {
            min_bid,
            max_bid,
            max_open_bids,
        }
    }

    #[must_use]
    pub fn from_config(config: &CompetitionConfig) -> Self {
        Self::new(
            config.min_bid,
            config.max_bid,
            config.max_open_bids_per_participant,
        )
    }

    /// Checks that need neither the book's bid list nor the ledger.
    pub fn precheck(
        &self,
        round: &Round,
        book: &BidBook,
        bidder: ParticipantId,
        item: ItemId,
        amount: Tokens,
    ) -> Result<()> {
        round.ensure_status(RoundStatus::Active)?;
        if book.is_sealed() {
            return Err(CompetitionError::BidBookSealed(round.id));
        }
        let owner = book.owner_of(item).ok_or(CompetitionError::ItemNotInRound {
            item,
            round: round.id,
        })?;
        if round.kind == RoundKind::Submission && owner == bidder {
            if let ItemId::Submission(submission) = item {
                return Err(CompetitionError::SelfBid(submission));
            }
        }
        if amount < self.min_bid || amount > self.max_bid {
            return Err(CompetitionError::InvalidBidAmount {
                amount,
                min: self.min_bid,
                max: self.max_bid,
            });
        }
        Ok(())
    }

    /// Validate, reserve, and insert one bid.
    pub fn admit(
        &self,
        round: &Round,
        book: &mut BidBook,
        ledger: &Ledger,
        bidder: ParticipantId,
        item: ItemId,
        amount: Tokens,
    ) -> Result<Bid> {
        self.precheck(round, book, bidder, item, amount)?;

        ledger.with_account(bidder, |entry| {
            if book.contains(bidder, item) {
                return Err(CompetitionError::DuplicateBid { bidder, item });
            }
            if book.open_bids_excluding(bidder, item) >= self.max_open_bids {
                return Err(CompetitionError::BidLimitExceeded {
                    limit: self.max_open_bids,
                });
            }
            LedgerOp::Reserve {
                participant: bidder,
                amount,
            }
            .apply(entry)?;
            book.push(bidder, item, amount)
        })
    }
}

impl Default for BidAdmission {
    fn default() -> Self {
        Self::from_config(&CompetitionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use xmmcg_types::{RoundId, SongId, SubmissionId};

    use super::*;

    struct Fixture {
        round: Round,
        book: BidBook,
        ledger: Ledger,
        items: Vec<ItemId>,
        owners: Vec<ParticipantId>,
    }

    fn fixture(kind: RoundKind, n_items: usize) -> Fixture {
        let mut round = Round::new(RoundId(1), "r", kind, None);
        round.activate().unwrap();
        let ledger = Ledger::new();
        let owners: Vec<ParticipantId> = (0..n_items).map(|_| ParticipantId::new()).collect();
        let items: Vec<ItemId> = (0..n_items)
            .map(|_| match kind {
                RoundKind::Song => ItemId::Song(SongId::new()),
                RoundKind::Submission => ItemId::Submission(SubmissionId::new()),
            })
            .collect();
        for owner in &owners {
            ledger.open_account(*owner, 100).unwrap();
        }
        let pool: BTreeMap<_, _> = items.iter().copied().zip(owners.iter().copied()).collect();
        Fixture {
            book: BidBook::new(round.id, pool),
            round,
            ledger,
            items,
            owners,
        }
    }

    #[test]
    fn over_budget_second_bid_rejected_first_intact() {
        let mut f = fixture(RoundKind::Song, 2);
        let gate = BidAdmission::default();
        let bidder = f.owners[0];
        gate.admit(&f.round, &mut f.book, &f.ledger, bidder, f.items[0], 70)
            .unwrap();
        let err = gate
            .admit(&f.round, &mut f.book, &f.ledger, bidder, f.items[1], 50)
            .unwrap_err();
        assert!(matches!(
            err,
            CompetitionError::InsufficientFunds {
                needed: 50,
                available: 30
            }
        ));
        assert_eq!(f.book.len(), 1);
        assert_eq!(f.book.bids()[0].amount, 70);
        assert_eq!(f.ledger.entry(bidder).unwrap().reserved, 70);
    }

    #[test]
    fn amount_bounds() {
        let mut f = fixture(RoundKind::Song, 1);
        let gate = BidAdmission::new(1, 999, 5);
        for bad in [0, 1000] {
            let err = gate
                .admit(&f.round, &mut f.book, &f.ledger, f.owners[0], f.items[0], bad)
                .unwrap_err();
            assert!(matches!(err, CompetitionError::InvalidBidAmount { .. }));
        }
        assert!(f.book.is_empty());
    }

    #[test]
    fn cardinality_limit() {
        let mut f = fixture(RoundKind::Song, 3);
        let gate = BidAdmission::new(1, 999, 2);
        let bidder = f.owners[0];
        gate.admit(&f.round, &mut f.book, &f.ledger, bidder, f.items[0], 1).unwrap();
        gate.admit(&f.round, &mut f.book, &f.ledger, bidder, f.items[1], 1).unwrap();
        let err = gate
            .admit(&f.round, &mut f.book, &f.ledger, bidder, f.items[2], 1)
            .unwrap_err();
        assert!(matches!(err, CompetitionError::BidLimitExceeded { limit: 2 }));
        assert_eq!(f.ledger.entry(bidder).unwrap().reserved, 2);
    }

    #[test]
    fn self_bid_in_submission_round() {
        let mut f = fixture(RoundKind::Submission, 2);
        let gate = BidAdmission::default();
        let err = gate
            .admit(&f.round, &mut f.book, &f.ledger, f.owners[0], f.items[0], 10)
            .unwrap_err();
        assert!(matches!(err, CompetitionError::SelfBid(_)));
        gate.admit(&f.round, &mut f.book, &f.ledger, f.owners[0], f.items[1], 10)
            .unwrap();
    }

    #[test]
    fn own_song_is_biddable() {
        let mut f = fixture(RoundKind::Song, 1);
        BidAdmission::default()
            .admit(&f.round, &mut f.book, &f.ledger, f.owners[0], f.items[0], 10)
            .unwrap();
    }

    #[test]
    fn inactive_round_and_foreign_item() {
        let mut f = fixture(RoundKind::Song, 1);
        let gate = BidAdmission::default();
        let err = gate
            .admit(
                &f.round,
                &mut f.book,
                &f.ledger,
                f.owners[0],
                ItemId::Song(SongId::new()),
                10,
            )
            .unwrap_err();
        assert!(matches!(err, CompetitionError::ItemNotInRound { .. }));

        let pending = Round::new(RoundId(9), "p", RoundKind::Song, None);
        let err = gate
            .admit(&pending, &mut f.book, &f.ledger, f.owners[0], f.items[0], 10)
            .unwrap_err();
        assert!(matches!(err, CompetitionError::WrongRoundStatus { .. }));
    }

    #[test]
    fn unknown_bidder_leaves_book_empty() {
        let mut f = fixture(RoundKind::Song, 1);
        let err = BidAdmission::default()
            .admit(
                &f.round,
                &mut f.book,
                &f.ledger,
                ParticipantId::new(),
                f.items[0],
                10,
            )
            .unwrap_err();
        assert!(matches!(err, CompetitionError::UnknownParticipant(_)));
        assert!(f.book.is_empty());
    }
}
