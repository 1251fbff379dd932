//! Peer-review matrix construction.
//!
//! Participants are ordered by their submission id. The reviewer at
//! position `i` reviews the submissions at positions `i+1 ..= i+K (mod N)`.
//! Every reviewer gets exactly `K` assignments, every submission receives
//! exactly `K`, and since every offset is in `1..N` no reviewer is ever
//! assigned their own submission.
//!
//! When `N <= K` no such matrix exists and construction fails before any
//! assignment is produced.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use xmmcg_types::{
    CompetitionError, ParticipantId, Result, ReviewAssignment, RoundId, Submission,
};

/// Circular-shift K-regular matcher.
#[derive(Debug, Clone, Copy)]
pub struct PeerReviewMatcher {
    per_reviewer: usize,
}

impl PeerReviewMatcher {
    /// # Errors
    /// `Configuration` if `per_reviewer` is zero.
    pub fn new(per_reviewer: usize) -> Result<Self> {
        if per_reviewer == 0 {
            return Err(CompetitionError::Configuration(
                "reviews_per_participant must be positive".to_string(),
            ));
        }
        Ok(Self { per_reviewer })
    }

    #[must_use]
    pub fn per_reviewer(&self) -> usize {
        self.per_reviewer
    }

    /// Build the full matrix for one round.
    ///
    /// `submissions` must hold exactly one submission per reviewer, and
    /// the submission owners must be exactly `reviewers`.
    ///
    /// # Errors
    /// - `ReviewPopulationMismatch` if owners and reviewers differ
    /// - `MatrixInfeasible` if `N <= K`
    pub fn build(
        &self,
        round_id: RoundId,
        submissions: &[Submission],
        reviewers: &[ParticipantId],
        assigned_at: DateTime<Utc>,
    ) -> Result<Vec<ReviewAssignment>> {
        let mut ordered: Vec<&Submission> = submissions.iter().collect();
        ordered.sort_by_key(|s| s.id);

        let owners: BTreeSet<ParticipantId> = ordered.iter().map(|s| s.owner).collect();
        let expected: BTreeSet<ParticipantId> = reviewers.iter().copied().collect();
        if owners.len() != ordered.len() || owners != expected || expected.len() != reviewers.len()
        {
            return Err(CompetitionError::ReviewPopulationMismatch {
                reviewers: reviewers.len(),
                submissions: submissions.len(),
            });
        }

        let n = ordered.len();
        let k = self.per_reviewer;
        if n <= k {
            return Err(CompetitionError::MatrixInfeasible {
                participants: n,
                per_reviewer: k,
            });
        }

        let mut assignments = Vec::with_capacity(n * k);
        for (i, reviewer_submission) in ordered.iter().enumerate() {
            let reviewer = reviewer_submission.owner;
            for offset in 1..=k {
                let target = ordered[(i + offset) % n];
                assignments.push(ReviewAssignment::new(
                    round_id,
                    reviewer,
                    target.id,
                    assigned_at,
                ));
            }
        }

        tracing::info!(
            round = %round_id,
            participants = n,
            per_reviewer = k,
            assignments = assignments.len(),
            "Review matrix built"
        );
        Ok(assignments)
    }
}
