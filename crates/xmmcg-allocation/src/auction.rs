//! Shared first-price sealed-bid auction core.
//!
//! Both round engines run the same two passes over a [`SealedRound`]:
//!
//! 1. **Contested pass**: the highest open bid across all items is settled
//!    first, at the bid's own amount, then the next highest, and so on.
//!    Equal top bids on an item are resolved by the configured
//!    [`TieBreakPolicy`]. A bidder leaves the pass once they hold an award,
//!    so nobody wins more than one item. Every other bid is dropped.
//! 2. **Fallback pass**: leftover items, in item order, are drawn for by
//!    bidders who won nothing and can afford the floor price. Each such
//!    bidder receives at most one fallback item.
//!
//! Leftovers are items nobody bid on and contested items whose bidders all
//! won elsewhere. Leftovers nobody drew stay unallocated; no price is ever
//! invented for them. The core has no side effects: it returns an
//! [`AllocationPlan`] and leaves commitment to the settlement plane.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
};

use xmmcg_types::{
    AllocationId, AllocationMechanism, AllocationPlan, AllocationResult, Bid, BidId,
    CompetitionConfig, FallbackPolicy, ItemId, ParticipantId, SealedRound, TieBreakPolicy, Tokens,
};

use crate::{RandomSource, determinism::compute_result_root};

/// Pricing and tie-break rules for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionRules {
    pub tie_break: TieBreakPolicy,
    pub fallback: FallbackPolicy,
    pub min_bid: Tokens,
}

impl AuctionRules {
    #[must_use]
    pub fn from_config(config: &CompetitionConfig) -> Self {
        Self {
            tie_break: config.tie_break,
            fallback: config.fallback,
            min_bid: config.min_bid,
        }
    }

    #[must_use]
    pub fn fallback_price(&self) -> Tokens {
        self.fallback.floor(self.min_bid)
    }
}

impl Default for AuctionRules {
    fn default() -> Self {
        Self::from_config(&CompetitionConfig::default())
    }
}

/// Run both passes.
///
/// With `exclude_owners` set, a bid on an item its bidder owns is dropped
/// without competing, and the fallback draw never hands an item to its
/// owner.
pub(crate) fn run_auction(
    sealed: &SealedRound,
    rules: &AuctionRules,
    rng: &mut dyn RandomSource,
    exclude_owners: bool,
) -> AllocationPlan {
    let owner_of = |item: &ItemId| sealed.item_owners.get(item).copied();

    let mut by_item: BTreeMap<ItemId, Vec<&Bid>> = BTreeMap::new();
    let mut dropped_bids: Vec<BidId> = Vec::new();
    let mut bidders: BTreeSet<ParticipantId> = BTreeSet::new();

    for bid in sealed.bids.iter().filter(|b| b.is_open()) {
        bidders.insert(bid.bidder);
        let owner = owner_of(&bid.item);
        let self_bid = exclude_owners && owner == Some(bid.bidder);
        if owner.is_none() || self_bid {
            dropped_bids.push(bid.id);
            continue;
        }
        by_item.entry(bid.item).or_default().push(bid);
    }

    let mut allocations: Vec<AllocationResult> = Vec::new();
    let mut winning_bids: Vec<BidId> = Vec::new();
    let mut winners: BTreeSet<ParticipantId> = BTreeSet::new();

    // Contested pass.
    loop {
        let next = by_item
            .iter()
            .filter_map(|(item, bids)| {
                bids.iter()
                    .filter(|b| !winners.contains(&b.bidder))
                    .map(|b| (Reverse(b.amount), b.arrival_key()))
                    .min()
                    .map(|key| (key, *item))
            })
            .min();
        let Some((_, item)) = next else {
            break;
        };
        let Some(bids) = by_item.remove(&item) else {
            break;
        };
        let eligible: Vec<&Bid> = bids
            .iter()
            .copied()
            .filter(|b| !winners.contains(&b.bidder))
            .collect();
        let Some(winner) = select_winner(&eligible, rules.tie_break, rng) else {
            dropped_bids.extend(bids.iter().map(|b| b.id));
            continue;
        };
        for bid in &bids {
            if bid.id != winner.id {
                dropped_bids.push(bid.id);
            }
        }
        tracing::debug!(
            round = %sealed.round_id,
            item = %item,
            winner = %winner.bidder,
            price = winner.amount,
            contenders = eligible.len(),
            "Item won"
        );
        winners.insert(winner.bidder);
        winning_bids.push(winner.id);
        allocations.push(AllocationResult {
            id: AllocationId::deterministic(sealed.round_id, item),
            round_id: sealed.round_id,
            item,
            winner: winner.bidder,
            final_price: winner.amount,
            mechanism: AllocationMechanism::Won,
            winning_bid: Some(winner.id),
            allocated_at: sealed.sealed_at,
        });
    }

    // Whatever is still contested had only bidders who already won.
    for bids in by_item.values() {
        dropped_bids.extend(bids.iter().map(|b| b.id));
    }
    let awarded: BTreeSet<ItemId> = allocations.iter().map(|a| a.item).collect();
    let leftover: Vec<ItemId> = sealed
        .items
        .iter()
        .filter(|item| !awarded.contains(*item))
        .copied()
        .collect();

    // Fallback pass.
    let mut unallocated = Vec::new();
    if rules.fallback.enabled {
        let price = rules.fallback_price();
        let mut eligible: Vec<ParticipantId> = bidders
            .iter()
            .filter(|p| !winners.contains(*p))
            .filter(|p| sealed.spendable.get(*p).copied().unwrap_or(0) >= price)
            .copied()
            .collect();

        for item in leftover {
            let owner = owner_of(&item);
            let candidates: Vec<usize> = eligible
                .iter()
                .enumerate()
                .filter(|(_, p)| !(exclude_owners && owner == Some(**p)))
                .map(|(i, _)| i)
                .collect();
            if candidates.is_empty() {
                unallocated.push(item);
                continue;
            }
            let chosen = eligible.remove(candidates[draw(rng, candidates.len())]);
            tracing::debug!(
                round = %sealed.round_id,
                item = %item,
                winner = %chosen,
                price,
                pool = candidates.len(),
                "Item drawn by fallback"
            );
            allocations.push(AllocationResult {
                id: AllocationId::deterministic(sealed.round_id, item),
                round_id: sealed.round_id,
                item,
                winner: chosen,
                final_price: price,
                mechanism: AllocationMechanism::Random,
                winning_bid: None,
                allocated_at: sealed.sealed_at,
            });
        }
    } else {
        unallocated = leftover;
    }

    allocations.sort_by_key(|a| a.item);
    winning_bids.sort();
    dropped_bids.sort();
    let result_root = compute_result_root(&allocations);

    AllocationPlan {
        round_id: sealed.round_id,
        kind: sealed.kind,
        allocations,
        winning_bids,
        dropped_bids,
        unallocated,
        continuations: Vec::new(),
        input_hash: sealed.input_hash,
        result_root,
    }
}

/// Highest amount wins; equal amounts go through the tie-break policy.
fn select_winner<'a>(
    bids: &[&'a Bid],
    policy: TieBreakPolicy,
    rng: &mut dyn RandomSource,
) -> Option<&'a Bid> {
    let top = bids.iter().map(|b| b.amount).max()?;
    let mut tied: Vec<&'a Bid> = bids.iter().copied().filter(|b| b.amount == top).collect();
    tied.sort_by(|a, b| a.arrival_key().cmp(&b.arrival_key()).then(a.id.cmp(&b.id)));
    match policy {
        TieBreakPolicy::EarliestSubmission => tied.first().copied(),
        TieBreakPolicy::Random if tied.len() > 1 => tied.get(draw(rng, tied.len())).copied(),
        TieBreakPolicy::Random => tied.first().copied(),
    }
}

/// An index in `0..upper` from `rng`. `upper` must be at least 1.
fn draw(rng: &mut dyn RandomSource, upper: usize) -> usize {
    let pick = rng.pick(upper);
    debug_assert!(pick < upper, "random source picked {pick}, out of range 0..{upper}");
    pick.min(upper - 1)
}
