//! # xmmcg-types
//!
//! Shared types, errors, and configuration for the **XMMCG** auction and
//! peer-review engine.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`ParticipantId`], [`SongId`], [`SubmissionId`], [`BidId`], [`RoundId`], [`ItemId`], [`AllocationId`], [`AssignmentId`], [`ReviewId`]
//! - **Round model**: [`Round`], [`RoundStatus`], [`RoundKind`], [`SealedRound`], [`AllocationPlan`]
//! - **Item model**: [`Song`], [`Submission`], [`SubmissionHalf`], [`SubmissionStatus`], [`ReviewStats`]
//! - **Bid model**: [`Bid`]
//! - **Allocation model**: [`AllocationResult`], [`AllocationMechanism`]
//! - **Ledger model**: [`LedgerEntry`], [`Tokens`]
//! - **Review model**: [`ReviewAssignment`], [`Review`], [`AnonymousReview`], [`RankingEntry`]
//! - **Configuration**: [`CompetitionConfig`], [`TieBreakPolicy`], [`FallbackPolicy`], [`LoggingConfig`]
//! - **Errors**: [`CompetitionError`] with `XM_ERR_` prefix codes
//! - **Constants**: defaults and limits

pub mod allocation;
pub mod bid;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod item;
pub mod ledger;
pub mod review;
pub mod round;

// Re-export all primary types at crate root:
//   use xmmcg_types::{Bid, Round, AllocationResult, ...};

pub use allocation::*;
pub use bid::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use item::*;
pub use ledger::*;
pub use review::*;
pub use round::*;

// Constants are accessed via `xmmcg_types::constants::FOO`.
