use rand::seq::SliceRandom;
use std::cmp::Ordering;

use crate::models::{RankingPolicy, ScoredTour};

/// Orders scored tours by the policy and keeps at most `limit`
pub fn rank_and_select(
    mut scored: Vec<ScoredTour>,
    policy: RankingPolicy,
    limit: usize,
) -> Vec<ScoredTour> {
    match policy {
        RankingPolicy::Scored => scored.sort_by(compare_scored),
        RankingPolicy::Random => scored.shuffle(&mut rand::thread_rng()),
    }

    scored.truncate(limit);
    scored
}

/// Descending score, then ascending id
fn compare_scored(a: &ScoredTour, b: &ScoredTour) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.tour.id.cmp(&b.tour.id))
}
