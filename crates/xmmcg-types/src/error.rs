//! Error types for the XMMCG competition engine.
//!
//! All errors use the `XM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors (bad bid, bad score, unknown entity)
//! - 2xx: Ledger errors
//! - 4xx: Round / state errors
//! - 5xx: Configuration errors
//! - 6xx: Consistency errors
//! - 9xx: General / internal errors
//!
//! Validation and state errors carry actionable messages for the caller.
//! Configuration and consistency errors are logged and surfaced as a generic
//! operational failure (see [`CompetitionError::public_message`]).

use thiserror::Error;

use crate::{
    AssignmentId, ItemId, ParticipantId, RoundId, RoundKind, RoundStatus, SongId, SubmissionId,
    Tokens,
};

/// Coarse classification of a [`CompetitionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input. No state change.
    Validation,
    /// Operation not allowed in the current lifecycle state. No state change.
    State,
    /// The requested construction is infeasible for the configured parameters.
    Config,
    /// An internal invariant broke mid-transaction. The transaction was aborted.
    Consistency,
    /// I/O, serialization and similar failures.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::State => write!(f, "STATE"),
            Self::Config => write!(f, "CONFIG"),
            Self::Consistency => write!(f, "CONSISTENCY"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Central error enum for all XMMCG operations.
#[derive(Debug, Error)]
pub enum CompetitionError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// Bid amount outside `[min, max]`.
    #[error("XM_ERR_100: Invalid bid amount {amount}: must be between {min} and {max}")]
    InvalidBidAmount { amount: Tokens, min: Tokens, max: Tokens },

    /// The bidder already has a bid on this item in this round.
    #[error("XM_ERR_101: Duplicate bid by {bidder} on {item}")]
    DuplicateBid { bidder: ParticipantId, item: ItemId },

    /// Too many open bids for this participant in this round.
    #[error("XM_ERR_102: Open bid limit of {limit} reached for this round")]
    BidLimitExceeded { limit: usize },

    /// Reserving the amount would exceed the participant's balance.
    #[error("XM_ERR_103: Insufficient funds: need {needed}, have {available} unreserved")]
    InsufficientFunds { needed: Tokens, available: Tokens },

    /// A participant bid on their own submission.
    #[error("XM_ERR_104: Cannot bid on your own submission {0}")]
    SelfBid(SubmissionId),

    /// Review score outside `[0, max]`.
    #[error("XM_ERR_105: Score {score} out of range 0..={max}")]
    ScoreOutOfRange { score: u32, max: u32 },

    /// The participant is not registered.
    #[error("XM_ERR_106: Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    /// The item does not exist.
    #[error("XM_ERR_107: Unknown item: {0}")]
    UnknownItem(ItemId),

    /// The item exists but is not auctioned in this round.
    #[error("XM_ERR_108: Item {item} is not biddable in {round}")]
    ItemNotInRound { item: ItemId, round: RoundId },

    /// A review for this assignment was already submitted.
    #[error("XM_ERR_109: Assignment {0} already reviewed")]
    AlreadyReviewed(AssignmentId),

    /// The review assignment does not exist.
    #[error("XM_ERR_110: Unknown assignment: {0}")]
    UnknownAssignment(AssignmentId),

    /// The participant is already registered.
    #[error("XM_ERR_111: Participant already registered: {0}")]
    DuplicateParticipant(ParticipantId),

    /// Each participant uploads at most one song.
    #[error("XM_ERR_112: Participant {0} already uploaded a song")]
    DuplicateSong(ParticipantId),

    /// The participant does not hold the allocation needed for this action.
    #[error("XM_ERR_113: {participant} holds no allocation for {song} in {round}")]
    NotAllocated {
        participant: ParticipantId,
        song: SongId,
        round: RoundId,
    },

    /// A first-half submission for this song already exists in this round.
    #[error("XM_ERR_114: Submission already registered for {0}")]
    DuplicateSubmission(SongId),

    /// Review comment exceeds the configured length.
    #[error("XM_ERR_115: Comment too long: {len} characters, max {max}")]
    CommentTooLong { len: usize, max: usize },

    /// Title empty or too long.
    #[error("XM_ERR_116: Invalid title: {reason}")]
    InvalidTitle { reason: String },

    // =================================================================
    // Ledger Errors (2xx)
    // =================================================================
    /// Releasing or committing more than is reserved.
    #[error("XM_ERR_200: Reservation underflow for {participant}: need {needed}, reserved {reserved}")]
    ReservationUnderflow {
        participant: ParticipantId,
        needed: Tokens,
        reserved: Tokens,
    },

    /// A committed debit would take the balance below zero.
    #[error("XM_ERR_201: Balance underflow for {participant}: debit {needed}, balance {balance}")]
    BalanceUnderflow {
        participant: ParticipantId,
        needed: Tokens,
        balance: Tokens,
    },

    // =================================================================
    // Round / State Errors (4xx)
    // =================================================================
    /// An operation was attempted in the wrong round status.
    #[error("XM_ERR_400: {round} is {actual}, expected {expected}")]
    WrongRoundStatus {
        round: RoundId,
        expected: RoundStatus,
        actual: RoundStatus,
    },

    /// The round's allocation has already been committed.
    #[error("XM_ERR_401: {0} already completed")]
    RoundAlreadyCompleted(RoundId),

    /// The round's bid book is sealed; no more bids are admitted.
    #[error("XM_ERR_402: Bid book for {0} is sealed")]
    BidBookSealed(RoundId),

    /// A review matrix already exists for the round.
    #[error("XM_ERR_403: Review matrix already built for {0}")]
    ReviewMatrixExists(RoundId),

    /// The round does not exist.
    #[error("XM_ERR_404: Unknown round: {0}")]
    UnknownRound(RoundId),

    /// The first half already has a continuation submission.
    #[error("XM_ERR_405: {0} already has a continuation")]
    SuccessorExists(SubmissionId),

    /// The operation targets a round of the other kind.
    #[error("XM_ERR_406: {round} is a {actual} round, expected {expected}")]
    WrongRoundKind {
        round: RoundId,
        expected: RoundKind,
        actual: RoundKind,
    },

    /// The song round already has a submission round auctioning its halves.
    #[error("XM_ERR_407: {parent} already has submission round {existing}")]
    SubmissionRoundExists { parent: RoundId, existing: RoundId },

    // =================================================================
    // Configuration Errors (5xx)
    // =================================================================
    /// No K-regular self-excluding assignment exists for N participants.
    #[error("XM_ERR_500: Review matrix infeasible: {participants} participants, {per_reviewer} reviews each")]
    MatrixInfeasible { participants: usize, per_reviewer: usize },

    /// Reviewers and submissions do not form a one-to-one population.
    #[error("XM_ERR_501: Review population mismatch: {reviewers} reviewers, {submissions} submissions")]
    ReviewPopulationMismatch { reviewers: usize, submissions: usize },

    /// Configuration error (invalid config file, bad values, etc.).
    #[error("XM_ERR_502: Configuration error: {0}")]
    Configuration(String),

    // =================================================================
    // Consistency Errors (6xx)
    // =================================================================
    /// A won item has no allocation result while materializing its continuation.
    #[error("XM_ERR_600: Missing allocation result for {0}")]
    MissingAllocation(ItemId),

    /// Token conservation broke: balance != granted - debited.
    #[error("XM_ERR_601: Token conservation violation: {reason}")]
    ConservationViolation { reason: String },

    /// An allocation plan disagrees with the round it is being committed to.
    #[error("XM_ERR_602: Inconsistent allocation plan: {reason}")]
    InconsistentPlan { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("XM_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("XM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("XM_ERR_903: I/O error: {0}")]
    Io(String),
}

impl CompetitionError {
    /// Which taxonomy bucket this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidBidAmount { .. }
            | Self::DuplicateBid { .. }
            | Self::BidLimitExceeded { .. }
            | Self::InsufficientFunds { .. }
            | Self::SelfBid(_)
            | Self::ScoreOutOfRange { .. }
            | Self::UnknownParticipant(_)
            | Self::UnknownItem(_)
            | Self::ItemNotInRound { .. }
            | Self::AlreadyReviewed(_)
            | Self::UnknownAssignment(_)
            | Self::DuplicateParticipant(_)
            | Self::DuplicateSong(_)
            | Self::NotAllocated { .. }
            | Self::DuplicateSubmission(_)
            | Self::CommentTooLong { .. }
            | Self::InvalidTitle { .. } => ErrorKind::Validation,
            Self::WrongRoundStatus { .. }
            | Self::RoundAlreadyCompleted(_)
            | Self::BidBookSealed(_)
            | Self::ReviewMatrixExists(_)
            | Self::UnknownRound(_)
            | Self::SuccessorExists(_)
            | Self::WrongRoundKind { .. }
            | Self::SubmissionRoundExists { .. } => ErrorKind::State,
            Self::MatrixInfeasible { .. }
            | Self::ReviewPopulationMismatch { .. }
            | Self::Configuration(_) => ErrorKind::Config,
            Self::ReservationUnderflow { .. }
            | Self::BalanceUnderflow { .. }
            | Self::MissingAllocation(_)
            | Self::ConservationViolation { .. }
            | Self::InconsistentPlan { .. } => ErrorKind::Consistency,
            Self::Internal(_) | Self::Serialization(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand back to a caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::State => self.to_string(),
            ErrorKind::Config | ErrorKind::Consistency | ErrorKind::Internal => {
                "XM_ERR_900: Operation failed, please contact an administrator".to_string()
            }
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, CompetitionError>;

impl From<std::io::Error> for CompetitionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CompetitionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
