//! Threshold-ranked lists.
//!
//! "Top matches", "top entities" and "top patterns" all come from the same two
//! steps: drop everything scoring below a threshold, then sort descending.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// An item paired with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scored<T> {
    pub item: T,
    pub score: f64,
}

impl<T> Scored<T> {
    pub fn new(item: T, score: f64) -> Self {
        Self { item, score }
    }
}

/// Descending by score; NaN sorts last.
fn by_score_desc<T>(a: &Scored<T>, b: &Scored<T>) -> Ordering {
    match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
    }
}

/// Keep items with `score >= threshold`, sorted descending. Ties keep input order.
pub fn rank_above<T>(items: impl IntoIterator<Item = Scored<T>>, threshold: f64) -> Vec<Scored<T>> {
    let mut kept: Vec<Scored<T>> = items
        .into_iter()
        .filter(|s| !s.score.is_nan() && s.score >= threshold)
        .collect();
    kept.sort_by(by_score_desc);
    kept
}

/// [`rank_above`] truncated to the first `n` items.
pub fn top_n<T>(
    items: impl IntoIterator<Item = Scored<T>>,
    threshold: f64,
    n: usize,
) -> Vec<Scored<T>> {
    let mut ranked = rank_above(items, threshold);
    ranked.truncate(n);
    ranked
}

/// Re-sort an already scored list in place (after scores were adjusted).
pub fn resort<T>(items: &mut [Scored<T>]) {
    items.sort_by(by_score_desc);
}
