//! # xmmcg-ingress
//!
//! **Admission plane**: token ledger, per-round bid books, bid admission,
//! and round sealing.
//!
//! ## Architecture
//!
//! 1. **Ledger**: per-participant balances with reservation accounting
//! 2. **BidAdmission**: hard gate; validates every bid and reserves its amount
//! 3. **BidBook**: one round's item pool and admitted bids
//! 4. **RoundSealer**: freezes a book into a `SealedRound` with an input hash
//!
//! ## Bid Flow
//!
//! ```text
//! submit_bid → BidAdmission.admit() → Ledger.reserve() → BidBook.push()
//!     → RoundSealer.seal() → SealedRound → allocation engine
//! ```
//!
//! Nothing reaches an allocation engine except through a sealed round.

pub mod admission;
pub mod bid_book;
pub mod ledger;
pub mod round_sealer;

pub use admission::BidAdmission;
pub use bid_book::BidBook;
pub use ledger::{Ledger, LedgerOp};
pub use round_sealer::{RoundSealer, spendable_of};
