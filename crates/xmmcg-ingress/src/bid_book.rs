//! Per-round bid book.
//!
//! The book holds a round's item pool and every bid admitted against it.
//! Bids are stored in admission order and are never re-priced; the only
//! mutation after admission is the `dropped` flag. Sealing freezes the
//! book: no bid is admitted afterwards, and the allocation pass runs over
//! what was there at the seal.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use xmmcg_types::{Bid, BidId, CompetitionError, ItemId, ParticipantId, Result, RoundId, Tokens};

#[derive(Debug)]
pub struct BidBook {
    round_id: RoundId,
    /// Item pool, frozen at activation, with each item's owner.
    items: BTreeMap<ItemId, ParticipantId>,
    /// Bids in admission order.
    bids: Vec<Bid>,
    /// (bidder, item) → position in `bids`.
    index: HashMap<(ParticipantId, ItemId), usize>,
    next_sequence: u64,
    sealed_at: Option<DateTime<Utc>>,
}

impl BidBook {
    /// An empty book over `items`.
    #[must_use]
    pub fn new(round_id: RoundId, items: BTreeMap<ItemId, ParticipantId>) -> Self {
        Self {
            round_id,
            items,
            bids: Vec::new(),
            index: HashMap::new(),
            next_sequence: 0,
            sealed_at: None,
        }
    }

    #[must_use]
    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    /// Owner of `item`, if it is in this round's pool.
    #[must_use]
    pub fn owner_of(&self, item: ItemId) -> Option<ParticipantId> {
        self.items.get(&item).copied()
    }

    #[must_use]
    pub fn items(&self) -> &BTreeMap<ItemId, ParticipantId> {
        &self.items
    }

    /// Append a bid. Callers run the admission checks first.
    ///
    /// # Errors
    /// - `BidBookSealed` once the book is sealed
    /// - `DuplicateBid` if the bidder already bid on this item
    pub fn push(&mut self, bidder: ParticipantId, item: ItemId, amount: Tokens) -> Result<Bid> {
        if self.is_sealed() {
            return Err(CompetitionError::BidBookSealed(self.round_id));
        }
        if self.index.contains_key(&(bidder, item)) {
            return Err(CompetitionError::DuplicateBid { bidder, item });
        }
        let bid = Bid {
            id: BidId::new(),
            round_id: self.round_id,
            bidder,
            item,
            amount,
            dropped: false,
            sequence: self.next_sequence,
            submitted_at: Utc::now(),
        };
        self.next_sequence += 1;
        self.index.insert((bidder, item), self.bids.len());
        self.bids.push(bid.clone());
        Ok(bid)
    }

    #[must_use]
    pub fn contains(&self, bidder: ParticipantId, item: ItemId) -> bool {
        self.index.contains_key(&(bidder, item))
    }

    /// Open bids by `bidder` on items other than `except`.
    #[must_use]
    pub fn open_bids_excluding(&self, bidder: ParticipantId, except: ItemId) -> usize {
        self.bids
            .iter()
            .filter(|b| b.bidder == bidder && b.item != except && b.is_open())
            .count()
    }

    /// Tokens `bidder` holds in reservations for this round.
    #[must_use]
    pub fn reserved_by(&self, bidder: ParticipantId) -> Tokens {
        self.bids
            .iter()
            .filter(|b| b.bidder == bidder && b.is_open())
            .map(|b| b.amount)
            .sum()
    }

    /// Every bid, in admission order.
    #[must_use]
    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    pub fn open_bids(&self) -> impl Iterator<Item = &Bid> {
        self.bids.iter().filter(|b| b.is_open())
    }

    pub fn bids_by(&self, bidder: ParticipantId) -> impl Iterator<Item = &Bid> {
        self.bids.iter().filter(move |b| b.bidder == bidder)
    }

    /// Freeze the book. Sealing again keeps the original seal time, so a
    /// retried allocation pass sees an identical snapshot.
    pub fn seal(&mut self) -> DateTime<Utc> {
        *self.sealed_at.get_or_insert_with(Utc::now)
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed_at.is_some()
    }

    #[must_use]
    pub fn sealed_at(&self) -> Option<DateTime<Utc>> {
        self.sealed_at
    }

    /// Mark the given bids as lost. Returns how many were newly dropped.
    pub fn mark_dropped(&mut self, ids: &[BidId]) -> usize {
        let mut dropped = 0;
        for bid in &mut self.bids {
            if bid.is_open() && ids.contains(&bid.id) {
                bid.dropped = true;
                dropped += 1;
            }
        }
        dropped
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use xmmcg_types::SongId;

    use super::*;

    fn book_with(n: usize) -> (BidBook, Vec<ItemId>) {
        let items: Vec<ItemId> = (0..n).map(|_| ItemId::Song(SongId::new())).collect();
        let pool = items.iter().map(|i| (*i, ParticipantId::new())).collect();
        (BidBook::new(RoundId(1), pool), items)
    }

    #[test]
    fn push_assigns_sequence() {
        let (mut book, items) = book_with(2);
        let alice = ParticipantId::new();
        let first = book.push(alice, items[0], 10).unwrap();
        let second = book.push(alice, items[1], 20).unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(book.reserved_by(alice), 30);
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn duplicate_bid_rejected() {
        let (mut book, items) = book_with(1);
        let alice = ParticipantId::new();
        book.push(alice, items[0], 10).unwrap();
        let err = book.push(alice, items[0], 15).unwrap_err();
        assert!(matches!(err, CompetitionError::DuplicateBid { .. }));
        assert_eq!(book.bids()[0].amount, 10);
    }

    #[test]
    fn sealed_book_rejects_and_keeps_seal_time() {
        let (mut book, items) = book_with(1);
        let at = book.seal();
        assert!(matches!(
            book.push(ParticipantId::new(), items[0], 5),
            Err(CompetitionError::BidBookSealed(RoundId(1)))
        ));
        assert_eq!(book.seal(), at);
    }

    #[test]
    fn open_bid_count_skips_target_item_and_dropped() {
        let (mut book, items) = book_with(3);
        let alice = ParticipantId::new();
        let a = book.push(alice, items[0], 1).unwrap();
        book.push(alice, items[1], 1).unwrap();
        assert_eq!(book.open_bids_excluding(alice, items[2]), 2);
        assert_eq!(book.open_bids_excluding(alice, items[0]), 1);

        assert_eq!(book.mark_dropped(&[a.id]), 1);
        assert_eq!(book.mark_dropped(&[a.id]), 0);
        assert_eq!(book.open_bids_excluding(alice, items[2]), 1);
        assert_eq!(book.reserved_by(alice), 1);
    }
}
