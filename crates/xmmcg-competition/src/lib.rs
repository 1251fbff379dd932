//! # xmmcg-competition
//!
//! **Service facade** for the XMMCG bidding competition.
//!
//! ```text
//! register → open_round → activate_round → submit_bid ...
//!     → close_round_and_allocate → submit_first_half
//!     → (submission round) submit_second_bid → close_round_and_allocate
//!     → build_review_matrix → submit_review → rankings
//! ```
//!
//! Configuration comes from [`CompetitionConfig`](xmmcg_types::CompetitionConfig),
//! logging is installed with [`init_tracing`].

pub mod logging;
pub mod service;

pub use logging::{filter_for, init_tracing};
pub use service::{AllocationReport, Competition};
