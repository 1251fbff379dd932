//! # xmmcg-settlement
//!
//! **Finality plane**: all-or-nothing round commits, continuation
//! submissions, and the token conservation check.
//!
//! ## Architecture
//!
//! The finality plane receives an `AllocationPlan` from an allocation
//! engine and:
//! 1. Validates idempotency (no round is committed twice)
//! 2. Checks the plan covers the sealed book exactly
//! 3. Stages continuation submissions (one successor per first half)
//! 4. Applies every ledger operation in one batch
//! 5. Marks losing bids dropped and completes the round
//! 6. Checks token conservation
//!
//! Anything that fails before step 5 leaves no trace, so a failed pass can
//! be retried in full.

pub mod commit;
pub mod conservation;
pub mod continuation;
pub mod idempotency;

pub use commit::{RoundSettler, SettlementReceipt};
pub use conservation::TokenConservation;
pub use continuation::ContinuationChain;
pub use idempotency::IdempotencyGuard;
