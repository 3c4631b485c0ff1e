//! Threshold, sort and truncate policy for scored candidates.

use rayon::prelude::*;

use crate::vector::dot;

/// Orders scored candidates for presentation.
///
/// Pure: shared by the cache-backed path and the linear scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityRanker {
    min_similarity: f32,
    num: usize,
}

impl SimilarityRanker {
    pub fn new(min_similarity: f32, num: usize) -> Self {
        Self {
            min_similarity,
            num,
        }
    }

    /// True if `score` clears the similarity floor.
    #[inline]
    pub fn accepts(&self, score: f32) -> bool {
        score >= self.min_similarity
    }

    /// Drop scores below the floor, sort descending and keep `num`.
    ///
    /// The sort is stable so equal scores keep candidate order. Scores are
    /// clamped to 1.0 to absorb floating-point overshoot.
    pub fn rank<T>(&self, candidates: Vec<(T, f32)>) -> Vec<(T, f32)> {
        let mut kept: Vec<(T, f32)> = candidates
            .into_iter()
            .filter(|(_, score)| self.accepts(*score))
            .map(|(item, score)| (item, score.min(1.0)))
            .collect();
        kept.sort_by(|a, b| b.1.total_cmp(&a.1));
        kept.truncate(self.num);
        kept
    }
}

/// Inner product of `query` with each vector, in input order.
pub fn score_against(query: &[f32], vectors: &[Vec<f32>]) -> Vec<f32> {
    vectors.par_iter().map(|v| dot(query, v)).collect()
}
