//! Auctioned items: songs and chart submissions.
//!
//! Items are supplied by the upload subsystem and are immutable once created,
//! except for a submission's status and review statistics.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AllocationId, ParticipantId, RoundId, SongId, SubmissionId, constants};

/// A song uploaded by a participant. One per participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub owner: ParticipantId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Song {
    #[must_use]
    pub fn new(owner: ParticipantId, title: impl Into<String>) -> Self {
        Self {
            id: SongId::new(),
            owner,
            title: title.into(),
            created_at: Utc::now(),
        }
    }
}

/// Which half of a chart a submission is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionHalf {
    /// Registered by the song winner; auctioned in the submission round.
    First,
    /// Materialized when a first half is won in the submission round.
    Second,
}

impl fmt::Display for SubmissionHalf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "FIRST_HALF"),
            Self::Second => write!(f, "SECOND_HALF"),
        }
    }
}

/// Lifecycle of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionStatus {
    /// Created as a continuation, waiting for the winner's upload.
    Awaiting,
    /// Content uploaded.
    Submitted,
    /// Every assigned review has been received.
    Reviewed,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Awaiting => write!(f, "AWAITING"),
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::Reviewed => write!(f, "REVIEWED"),
        }
    }
}

/// Running review statistics for one submission.
///
/// Only the score aggregator mutates these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub review_count: u32,
    pub total_score: u64,
    /// `total_score / review_count`, rounded to two decimal places.
    pub average_score: Decimal,
}

impl ReviewStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            review_count: 0,
            total_score: 0,
            average_score: Decimal::ZERO,
        }
    }
}

impl Default for ReviewStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A chart submission. First halves are items in the submission round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    /// The round that produced this submission: the song round for a first
    /// half, the submission round for a continuation.
    pub round_id: RoundId,
    pub owner: ParticipantId,
    pub song_id: SongId,
    pub half: SubmissionHalf,
    pub status: SubmissionStatus,
    /// For a second half: the first half it continues.
    pub predecessor: Option<SubmissionId>,
    /// The allocation that entitled `owner` to this submission.
    pub allocation: Option<AllocationId>,
    pub stats: ReviewStats,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    /// A submitted first half.
    #[must_use]
    pub fn first_half(
        round_id: RoundId,
        owner: ParticipantId,
        song_id: SongId,
        allocation: Option<AllocationId>,
    ) -> Self {
        Self {
            id: SubmissionId::new(),
            round_id,
            owner,
            song_id,
            half: SubmissionHalf::First,
            status: SubmissionStatus::Submitted,
            predecessor: None,
            allocation,
            stats: ReviewStats::new(),
            created_at: Utc::now(),
        }
    }

    /// The continuation created when `predecessor` is won by `winner`.
    #[must_use]
    pub fn continuation(
        round_id: RoundId,
        winner: ParticipantId,
        predecessor: &Submission,
        allocation: AllocationId,
    ) -> Self {
        Self {
            id: SubmissionId::continuation_of(allocation),
            round_id,
            owner: winner,
            song_id: predecessor.song_id,
            half: SubmissionHalf::Second,
            status: SubmissionStatus::Awaiting,
            predecessor: Some(predecessor.id),
            allocation: Some(allocation),
            stats: ReviewStats::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_first_half(&self) -> bool {
        self.half == SubmissionHalf::First
    }
}

/// Check a song title the way the upload subsystem does.
pub fn validate_title(title: &str) -> crate::Result<()> {
    if title.trim().is_empty() {
        return Err(crate::CompetitionError::InvalidTitle {
            reason: "title must not be empty".to_string(),
        });
    }
    if title.chars().count() > constants::MAX_TITLE_LEN {
        return Err(crate::CompetitionError::InvalidTitle {
            reason: format!("title longer than {} characters", constants::MAX_TITLE_LEN),
        });
    }
    Ok(())
}
