use rayon::prelude::*;
use tracing::debug;

use crate::{cluster::corpus::ExtractedCorpus, utils::math::sparse::cosine_from_parts};

/// Pairwise cosine similarity of every document pair, computed once.
///
/// Stored as a condensed upper triangle: row `i` holds pairs `(i, j)` for `j > i`.
/// Lookups are symmetric and every stored value lies in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    n: usize,
    scores: Vec<f64>,
}

impl SimilarityMatrix {
    /// Build the matrix for every document of the corpus.
    /// Rows are computed in parallel; the layout does not depend on scheduling.
    pub fn build(corpus: &ExtractedCorpus) -> Self {
        let n = corpus.doc_num();
        let scores: Vec<f64> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let a = &corpus.vectors[i];
                let norm_sq_a = corpus.norm_sqs[i];
                (i + 1..n).map(move |j| {
                    let norm_sq_b = corpus.norm_sqs[j];
                    if norm_sq_a == 0.0 || norm_sq_b == 0.0 {
                        return 0.0;
                    }
                    cosine_from_parts(a.dot(&corpus.vectors[j]), norm_sq_a, norm_sq_b)
                })
            })
            .collect();
        debug!(docs = n, pairs = scores.len(), "similarity matrix built");
        Self { n, scores }
    }

    /// Build from a dense row-major table. Values are clamped to [0, 1]
    /// and only the upper triangle is read.
    pub fn from_dense(rows: &[Vec<f64>]) -> Self {
        let n = rows.len();
        let mut scores = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in i + 1..n {
                let v = rows[i].get(j).copied().unwrap_or(0.0);
                // -0.0 and NaN land on +0.0
                scores.push(if v.is_nan() || v <= 0.0 { 0.0 } else { v.min(1.0) });
            }
        }
        Self { n, scores }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < j && j < self.n);
        // rows 0..i hold (n-1) + (n-2) + ... + (n-i) entries
        i * (2 * self.n - i - 1) / 2 + (j - i - 1)
    }

    /// Similarity of documents `a` and `b`; a document is fully similar to itself
    #[inline]
    pub fn get(&self, a: usize, b: usize) -> f64 {
        match a.cmp(&b) {
            std::cmp::Ordering::Equal => 1.0,
            std::cmp::Ordering::Less => self.scores[self.offset(a, b)],
            std::cmp::Ordering::Greater => self.scores[self.offset(b, a)],
        }
    }

    /// Mean similarity over every cross pair of the two member lists.
    ///
    /// Summation runs in member order, so the same lists always give
    /// the same bits.
    pub fn average_linkage(&self, a: &[usize], b: &[usize]) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let mut sum = 0_f64;
        for &x in a {
            for &y in b {
                sum += self.get(x, y);
            }
        }
        sum / (a.len() * b.len()) as f64
    }
}
