//! # xmmcg-review
//!
//! **Review plane**: builds the per-round peer-review matrix and folds
//! committed scores into submission statistics.
//!
//! ## Architecture
//!
//! - [`PeerReviewMatcher`] turns a round's submissions into a K-regular,
//!   self-excluding assignment set, or fails before producing anything.
//! - [`ReviewBoard`] stores that set once per round and records reviews
//!   against it.
//! - [`ScoreAggregator`] is the single writer of a submission's review
//!   statistics and produces rankings.

pub mod aggregator;
pub mod board;
pub mod matcher;

pub use aggregator::{ScoreAggregator, recompute};
pub use board::{ReviewBoard, ReviewRules};
pub use matcher::PeerReviewMatcher;
