//! System-wide constants and defaults for the XMMCG engine.

/// Tokens granted to every participant on registration.
pub const DEFAULT_INITIAL_TOKENS: u64 = 100;

/// Lowest admissible bid amount.
pub const DEFAULT_MIN_BID: u64 = 1;

/// Highest admissible bid amount.
pub const DEFAULT_MAX_BID: u64 = 999;

/// Maximum open (non-dropped) bids per participant per round.
pub const DEFAULT_MAX_OPEN_BIDS: usize = 5;

/// Review assignments per reviewer and per submission (K).
pub const DEFAULT_REVIEWS_PER_PARTICIPANT: usize = 8;

/// Highest score a reviewer may award.
pub const DEFAULT_MAX_REVIEW_SCORE: u32 = 50;

/// Maximum review comment length, in characters.
pub const DEFAULT_MAX_COMMENT_LEN: usize = 1000;

/// Maximum song title length, in characters.
pub const MAX_TITLE_LEN: usize = 100;

/// Decimal places kept in a submission's average score.
pub const AVERAGE_SCORE_DP: u32 = 2;

/// Default `tracing` filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "XMMCG";
