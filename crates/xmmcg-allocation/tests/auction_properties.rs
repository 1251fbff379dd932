//! Property tests for the allocation engines, fed through the real
//! admission plane: ledger reservations, bid book, and round sealer.
//!
//! Each case generates a random round, admits whatever bids the gate
//! accepts, seals, allocates, and checks the auction invariants.

use std::collections::{BTreeMap, BTreeSet};

use rand::{Rng, SeedableRng, rngs::StdRng};
use xmmcg_allocation::{FirstPriceAllocationEngine, SeededRandom, SecondRoundAllocationEngine};
use xmmcg_ingress::{BidAdmission, BidBook, Ledger, RoundSealer};
use xmmcg_types::*;

struct Generated {
    sealed: SealedRound,
    accepted: Vec<Bid>,
}

fn generate(rng: &mut StdRng, kind: RoundKind) -> Generated {
    let n_participants = rng.gen_range(2..8);
    let n_items = rng.gen_range(1..8);

    let ledger = Ledger::new();
    let participants: Vec<ParticipantId> = (0..n_participants).map(|_| ParticipantId::new()).collect();
    for p in &participants {
        ledger.open_account(*p, 100).unwrap();
    }

    let mut pool = BTreeMap::new();
    for _ in 0..n_items {
        let owner = participants[rng.gen_range(0..participants.len())];
        let item = match kind {
            RoundKind::Song => ItemId::Song(SongId::new()),
            RoundKind::Submission => ItemId::Submission(SubmissionId::new()),
        };
        pool.insert(item, owner);
    }
    let items: Vec<ItemId> = pool.keys().copied().collect();

    let mut round = Round::new(RoundId(1), "generated", kind, None);
    round.activate().unwrap();
    let mut book = BidBook::new(round.id, pool);
    let gate = BidAdmission::new(1, 999, 3);

    let mut accepted = Vec::new();
    for _ in 0..rng.gen_range(0..24) {
        let bidder = participants[rng.gen_range(0..participants.len())];
        let item = items[rng.gen_range(0..items.len())];
        let amount = rng.gen_range(1..60);
        if let Ok(bid) = gate.admit(&round, &mut book, &ledger, bidder, item, amount) {
            accepted.push(bid);
        }
    }

    let sealed = RoundSealer::seal(&round, &mut book, &ledger).unwrap();
    Generated { sealed, accepted }
}

fn check_common(generated: &Generated, plan: &AllocationPlan, exclude_owners: bool) {
    let sealed = &generated.sealed;
    let mut by_item: BTreeMap<ItemId, Vec<&Bid>> = BTreeMap::new();
    for bid in &generated.accepted {
        let own = sealed.item_owners.get(&bid.item) == Some(&bid.bidder);
        if !(exclude_owners && own) {
            by_item.entry(bid.item).or_default().push(bid);
        }
    }

    // Nobody holds more than one award.
    let mut holding: BTreeMap<ParticipantId, ItemId> = BTreeMap::new();
    for a in &plan.allocations {
        assert!(
            holding.insert(a.winner, a.item).is_none(),
            "{} won twice",
            a.winner
        );
    }
    let won_elsewhere =
        |p: &ParticipantId, item: &ItemId| holding.get(p).is_some_and(|held| held != item);

    // A contested item goes to its highest bid from a bidder not already
    // holding an award; if every bidder holds one, it is not won outright.
    for (item, bids) in &by_item {
        let award = plan.allocations.iter().find(|a| a.item == *item);
        match award.filter(|a| a.mechanism == AllocationMechanism::Won) {
            Some(award) => {
                let winning = award.winning_bid.unwrap();
                let bid = bids.iter().find(|b| b.id == winning).unwrap();
                assert_eq!(award.final_price, bid.amount);
                for other in bids.iter().filter(|b| b.id != winning) {
                    assert!(plan.dropped_bids.contains(&other.id));
                    if other.amount > award.final_price {
                        assert!(won_elsewhere(&other.bidder, item));
                    }
                }
            }
            None => {
                for bid in bids {
                    assert!(won_elsewhere(&bid.bidder, item), "{item} left unwon");
                    assert!(plan.dropped_bids.contains(&bid.id));
                }
            }
        }
    }

    // Every bid is either winning or dropped, never both.
    let winning: BTreeSet<_> = plan.winning_bids.iter().collect();
    let dropped: BTreeSet<_> = plan.dropped_bids.iter().collect();
    assert!(winning.is_disjoint(&dropped));
    assert_eq!(winning.len() + dropped.len(), generated.accepted.len());

    // Nobody is charged more than they could spend.
    let mut charged: BTreeMap<ParticipantId, Tokens> = BTreeMap::new();
    for a in &plan.allocations {
        *charged.entry(a.winner).or_default() += a.final_price;
    }
    for (p, total) in charged {
        assert!(total <= 100, "{p} charged {total}");
    }

    // Items partition into awarded and unallocated.
    assert_eq!(
        plan.allocations.len() + plan.unallocated.len(),
        sealed.items.len()
    );
}

#[test]
fn song_round_properties_hold() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let engine = FirstPriceAllocationEngine::default();
    for case in 0..200 {
        let generated = generate(&mut rng, RoundKind::Song);
        let plan = engine
            .allocate(&generated.sealed, &mut SeededRandom::new(case))
            .unwrap();
        check_common(&generated, &plan, false);
        assert!(plan.continuations.is_empty());
    }
}

#[test]
fn submission_round_properties_hold() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let engine = SecondRoundAllocationEngine::default();
    for case in 0..200 {
        let generated = generate(&mut rng, RoundKind::Submission);
        let plan = engine
            .allocate(&generated.sealed, &mut SeededRandom::new(case))
            .unwrap();
        check_common(&generated, &plan, true);
        for a in &plan.allocations {
            assert_ne!(generated.sealed.item_owners.get(&a.item), Some(&a.winner));
        }
        assert_eq!(plan.continuations.len(), plan.allocations.len());
    }
}

#[test]
fn retried_pass_is_identical() {
    let mut rng = StdRng::seed_from_u64(42);
    let engine = FirstPriceAllocationEngine::default();
    for _ in 0..50 {
        let generated = generate(&mut rng, RoundKind::Song);
        let a = engine
            .allocate(&generated.sealed, &mut SeededRandom::new(1))
            .unwrap();
        let b = engine
            .allocate(&generated.sealed, &mut SeededRandom::new(1))
            .unwrap();
        assert_eq!(a.allocations, b.allocations);
        assert_eq!(a.result_root, b.result_root);
        assert_eq!(a.input_hash, generated.sealed.input_hash);
    }
}
