//! Per-round review board.
//!
//! Holds the immutable assignment set produced by the matcher and the
//! reviews committed against it. A board accepts exactly one matrix; a
//! second install is a state error and leaves the first untouched.
//!
//! Lock order when recording a review: board, then submission.

use std::collections::BTreeMap;

use xmmcg_types::{
    AssignmentId, AssignmentStatus, CompetitionConfig, CompetitionError, ParticipantId, Result,
    Review, ReviewAssignment, RoundId, Submission, SubmissionId,
};

use crate::ScoreAggregator;

/// Limits applied to incoming reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewRules {
    pub per_reviewer: usize,
    pub max_score: u32,
    pub max_comment_len: usize,
}

impl ReviewRules {
    #[must_use]
    pub fn from_config(config: &CompetitionConfig) -> Self {
        Self {
            per_reviewer: config.reviews_per_participant,
            max_score: config.max_review_score,
            max_comment_len: config.max_comment_len,
        }
    }

    /// Score bound and comment length, checked before anything is touched.
    pub fn check(&self, score: u32, comment: Option<&str>) -> Result<()> {
        if score > self.max_score {
            return Err(CompetitionError::ScoreOutOfRange {
                score,
                max: self.max_score,
            });
        }
        if let Some(text) = comment {
            let len = text.chars().count();
            if len > self.max_comment_len {
                return Err(CompetitionError::CommentTooLong {
                    len,
                    max: self.max_comment_len,
                });
            }
        }
        Ok(())
    }
}

impl Default for ReviewRules {
    fn default() -> Self {
        Self::from_config(&CompetitionConfig::default())
    }
}

#[derive(Debug)]
pub struct ReviewBoard {
    round_id: RoundId,
    rules: ReviewRules,
    installed: bool,
    assignments: BTreeMap<AssignmentId, ReviewAssignment>,
    reviews: BTreeMap<AssignmentId, Review>,
}

impl ReviewBoard {
    #[must_use]
    pub fn new(round_id: RoundId, rules: ReviewRules) -> Self {
        Self {
            round_id,
            rules,
            installed: false,
            assignments: BTreeMap::new(),
            reviews: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    #[must_use]
    pub fn rules(&self) -> ReviewRules {
        self.rules
    }

    #[must_use]
    pub fn has_matrix(&self) -> bool {
        self.installed
    }

    /// Store the matrix for this round.
    ///
    /// # Errors
    /// `ReviewMatrixExists` if a matrix was already installed.
    pub fn install(&mut self, assignments: Vec<ReviewAssignment>) -> Result<usize> {
        if self.installed {
            return Err(CompetitionError::ReviewMatrixExists(self.round_id));
        }
        if let Some(foreign) = assignments.iter().find(|a| a.round_id != self.round_id) {
            return Err(CompetitionError::Internal(format!(
                "assignment {} belongs to {}, not {}",
                foreign.id, foreign.round_id, self.round_id
            )));
        }
        let count = assignments.len();
        self.assignments = assignments.into_iter().map(|a| (a.id, a)).collect();
        if self.assignments.len() != count {
            self.assignments.clear();
            return Err(CompetitionError::Internal(
                "duplicate assignment in review matrix".to_string(),
            ));
        }
        self.installed = true;
        Ok(count)
    }

    #[must_use]
    pub fn assignment(&self, id: AssignmentId) -> Option<&ReviewAssignment> {
        self.assignments.get(&id)
    }

    /// Record `reviewer`'s score for one of their assignments and fold it
    /// into `submission`.
    ///
    /// An assignment that is not `reviewer`'s is reported as unknown.
    /// Every check runs before any state changes.
    pub fn record_review(
        &mut self,
        assignment_id: AssignmentId,
        reviewer: ParticipantId,
        score: u32,
        comment: Option<String>,
        submission: &mut Submission,
    ) -> Result<Review> {
        let assignment = self
            .assignments
            .get(&assignment_id)
            .filter(|a| a.reviewer == reviewer)
            .ok_or(CompetitionError::UnknownAssignment(assignment_id))?;
        if assignment.status == AssignmentStatus::Completed {
            return Err(CompetitionError::AlreadyReviewed(assignment_id));
        }
        self.rules.check(score, comment.as_deref())?;
        if submission.id != assignment.submission {
            return Err(CompetitionError::Internal(format!(
                "assignment {assignment_id} targets {}, got {}",
                assignment.submission, submission.id
            )));
        }

        let review = Review::for_assignment(assignment, score, comment);
        ScoreAggregator::fold(submission, score, self.rules.per_reviewer);
        if let Some(a) = self.assignments.get_mut(&assignment_id) {
            a.status = AssignmentStatus::Completed;
        }
        self.reviews.insert(assignment_id, review.clone());

        tracing::debug!(
            round = %self.round_id,
            assignment = %assignment_id,
            submission = %submission.id,
            score,
            review_count = submission.stats.review_count,
            "Review recorded"
        );
        Ok(review)
    }

    /// Assignments given to `reviewer`, ordered by submission.
    #[must_use]
    pub fn assignments_for(&self, reviewer: ParticipantId) -> Vec<ReviewAssignment> {
        let mut out: Vec<ReviewAssignment> = self
            .assignments
            .values()
            .filter(|a| a.reviewer == reviewer)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.submission);
        out
    }

    pub fn assignments(&self) -> impl Iterator<Item = &ReviewAssignment> {
        self.assignments.values()
    }

    /// Reviews received by one submission, oldest first.
    #[must_use]
    pub fn reviews_for(&self, submission: SubmissionId) -> Vec<Review> {
        let mut out: Vec<Review> = self
            .reviews
            .values()
            .filter(|r| r.submission == submission)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.assignments.values().filter(|a| a.is_pending()).count()
    }

    #[must_use]
    pub fn review_count(&self) -> usize {
        self.reviews.len()
    }
}
