//! Randomized checks of the review matrix and the score fold.
//!
//! Every case draws a population size and a per-reviewer count, builds
//! the matrix, and checks degrees and self-exclusion. Infeasible draws
//! must fail with nothing produced.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::{Rng, SeedableRng, rngs::StdRng};
use xmmcg_review::{PeerReviewMatcher, ReviewBoard, ReviewRules, ScoreAggregator, recompute};
use xmmcg_types::*;

fn population(n: usize) -> (Vec<Submission>, Vec<ParticipantId>) {
    let reviewers: Vec<ParticipantId> = (0..n).map(|_| ParticipantId::new()).collect();
    let subs = reviewers
        .iter()
        .map(|p| Submission::first_half(RoundId(1), *p, SongId::new(), None))
        .collect();
    (subs, reviewers)
}

#[test]
fn degrees_and_exclusion_hold() {
    let mut rng = StdRng::seed_from_u64(0xBEEF);
    for _ in 0..150 {
        let n = rng.gen_range(1..20);
        let k = rng.gen_range(1..12);
        let (subs, reviewers) = population(n);
        let result = PeerReviewMatcher::new(k)
            .unwrap()
            .build(RoundId(1), &subs, &reviewers, Utc::now());

        if n <= k {
            assert!(matches!(
                result,
                Err(CompetitionError::MatrixInfeasible { .. })
            ));
            continue;
        }
        let matrix = result.unwrap();
        assert_eq!(matrix.len(), n * k);

        let owner_of: BTreeMap<_, _> = subs.iter().map(|s| (s.id, s.owner)).collect();
        let mut out_deg: BTreeMap<ParticipantId, usize> = BTreeMap::new();
        let mut in_deg: BTreeMap<SubmissionId, usize> = BTreeMap::new();
        let mut seen = std::collections::BTreeSet::new();
        for a in &matrix {
            assert_ne!(owner_of[&a.submission], a.reviewer);
            assert!(seen.insert(a.id), "duplicate assignment");
            *out_deg.entry(a.reviewer).or_default() += 1;
            *in_deg.entry(a.submission).or_default() += 1;
        }
        assert_eq!(out_deg.len(), n);
        assert_eq!(in_deg.len(), n);
        assert!(out_deg.values().chain(in_deg.values()).all(|d| *d == k));
    }
}

#[test]
fn random_scores_fold_without_drift() {
    let mut rng = StdRng::seed_from_u64(7);
    let (subs, reviewers) = population(9);
    let k = 8;
    let matrix = PeerReviewMatcher::new(k)
        .unwrap()
        .build(RoundId(1), &subs, &reviewers, Utc::now())
        .unwrap();
    let mut board = ReviewBoard::new(
        RoundId(1),
        ReviewRules {
            per_reviewer: k,
            ..ReviewRules::default()
        },
    );
    board.install(matrix.clone()).unwrap();

    let mut submissions: BTreeMap<SubmissionId, Submission> =
        subs.into_iter().map(|s| (s.id, s)).collect();
    let mut raw: BTreeMap<SubmissionId, Vec<u32>> = BTreeMap::new();
    for a in &matrix {
        let score = rng.gen_range(0..=50);
        let sub = submissions.get_mut(&a.submission).unwrap();
        board.record_review(a.id, a.reviewer, score, None, sub).unwrap();
        raw.entry(a.submission).or_default().push(score);
    }

    for (id, scores) in &raw {
        assert_eq!(submissions[id].stats, recompute(scores));
        assert_eq!(submissions[id].status, SubmissionStatus::Reviewed);
    }
    let ranking = ScoreAggregator::rank(submissions.values());
    assert_eq!(ranking.len(), 9);
    for pair in ranking.windows(2) {
        assert!(pair[0].average_score >= pair[1].average_score);
    }
}
