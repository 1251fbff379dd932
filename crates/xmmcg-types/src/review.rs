//! Peer-review types.
//!
//! A [`ReviewAssignment`] pairs a reviewer with a submission they do not own.
//! Assignments are immutable once created apart from their status, which
//! moves `Pending → Completed` exactly once when the [`Review`] arrives.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AssignmentId, ParticipantId, ReviewId, RoundId, SubmissionId};

/// Whether an assignment has been reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentStatus {
    Pending,
    Completed,
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// One edge of the review matrix. Unique per (round, reviewer, submission).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewAssignment {
    pub id: AssignmentId,
    pub round_id: RoundId,
    pub reviewer: ParticipantId,
    pub submission: SubmissionId,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
}

impl ReviewAssignment {
    #[must_use]
    pub fn new(
        round_id: RoundId,
        reviewer: ParticipantId,
        submission: SubmissionId,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AssignmentId::deterministic(round_id, reviewer, submission),
            round_id,
            reviewer,
            submission,
            status: AssignmentStatus::Pending,
            assigned_at,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == AssignmentStatus::Pending
    }
}

/// A committed review. One per assignment, immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub assignment_id: AssignmentId,
    pub round_id: RoundId,
    pub reviewer: ParticipantId,
    pub submission: SubmissionId,
    pub score: u32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// The review that completes `assignment`.
    #[must_use]
    pub fn for_assignment(assignment: &ReviewAssignment, score: u32, comment: Option<String>) -> Self {
        Self {
            id: ReviewId::new(),
            assignment_id: assignment.id,
            round_id: assignment.round_id,
            reviewer: assignment.reviewer,
            submission: assignment.submission,
            score,
            comment,
            created_at: Utc::now(),
        }
    }

    /// The reviewer-free view shown to the submission's owner.
    #[must_use]
    pub fn anonymized(&self) -> AnonymousReview {
        AnonymousReview {
            score: self.score,
            comment: self.comment.clone(),
            created_at: self.created_at,
        }
    }
}

/// A review with the reviewer's identity removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousReview {
    pub score: u32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of a round's ranking table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// 1-based position.
    pub rank: usize,
    pub submission: SubmissionId,
    pub owner: ParticipantId,
    pub review_count: u32,
    pub total_score: u64,
    pub average_score: Decimal,
}
