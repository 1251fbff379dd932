//! Score aggregation and rankings.
//!
//! [`ScoreAggregator::fold`] is the only code that writes a submission's
//! `review_count`, `total_score`, and `average_score`. Callers hold the
//! submission's lock across the call, so each fold is one atomic
//! read-modify-write.

use rust_decimal::{Decimal, RoundingStrategy};
use xmmcg_types::{RankingEntry, ReviewStats, Submission, SubmissionStatus, constants};

pub struct ScoreAggregator;

impl ScoreAggregator {
    /// Fold one committed score into `submission`.
    ///
    /// Once `expected_reviews` scores have arrived the submission is marked
    /// `Reviewed`.
    pub fn fold(submission: &mut Submission, score: u32, expected_reviews: usize) {
        let stats = &mut submission.stats;
        stats.review_count += 1;
        stats.total_score += u64::from(score);
        stats.average_score = Self::average(stats.total_score, stats.review_count);

        if usize::try_from(stats.review_count).is_ok_and(|n| n >= expected_reviews) {
            submission.status = SubmissionStatus::Reviewed;
        }
    }

    /// `total / count`, two decimal places, halves away from zero.
    #[must_use]
    pub fn average(total: u64, count: u32) -> Decimal {
        if count == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(total) / Decimal::from(count)).round_dp_with_strategy(
            constants::AVERAGE_SCORE_DP,
            RoundingStrategy::MidpointAwayFromZero,
        )
    }

    /// Order reviewed submissions: average desc, total desc, then id.
    /// Submissions without reviews are left out.
    #[must_use]
    pub fn rank<'a>(submissions: impl IntoIterator<Item = &'a Submission>) -> Vec<RankingEntry> {
        let mut reviewed: Vec<&Submission> = submissions
            .into_iter()
            .filter(|s| s.stats.review_count > 0)
            .collect();
        reviewed.sort_by(|a, b| {
            b.stats
                .average_score
                .cmp(&a.stats.average_score)
                .then(b.stats.total_score.cmp(&a.stats.total_score))
                .then(a.id.cmp(&b.id))
        });
        reviewed
            .into_iter()
            .enumerate()
            .map(|(i, s)| RankingEntry {
                rank: i + 1,
                submission: s.id,
                owner: s.owner,
                review_count: s.stats.review_count,
                total_score: s.stats.total_score,
                average_score: s.stats.average_score,
            })
            .collect()
    }
}

/// Recompute stats from raw scores. Used to audit the running totals.
#[must_use]
pub fn recompute(scores: &[u32]) -> ReviewStats {
    let total: u64 = scores.iter().map(|s| u64::from(*s)).sum();
    let count = u32::try_from(scores.len()).unwrap_or(u32::MAX);
    ReviewStats {
        review_count: count,
        total_score: total,
        average_score: ScoreAggregator::average(total, count),
    }
}
