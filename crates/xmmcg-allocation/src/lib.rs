//! # xmmcg-allocation
//!
//! **Pure deterministic allocation engines for XMMCG.**
//!
//! The allocation plane takes a sealed round of pre-reserved bids and
//! produces an [`AllocationPlan`](xmmcg_types::AllocationPlan). It has:
//!
//! - **Zero side effects**: no ledger writes, no round mutation
//! - **Deterministic output**: same sealed round and seed, same plan
//! - **Injectable randomness**: tie-breaks and fallback draws go through [`RandomSource`]
//! - **Self-exclusion**: submission rounds never award a half to its owner

pub mod auction;
pub mod determinism;
pub mod first_round;
pub mod random;
pub mod second_round;

pub use auction::AuctionRules;
pub use determinism::{compute_result_root, verify_result_root};
pub use first_round::FirstPriceAllocationEngine;
pub use random::{FirstPick, RandomSource, SeededRandom};
pub use second_round::SecondRoundAllocationEngine;
