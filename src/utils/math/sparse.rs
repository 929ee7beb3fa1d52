use std::cmp::Ordering;

use num::Num;
use serde::{Deserialize, Serialize};

use crate::utils::sort::radix_sort_u32_soa;

/// SparseVec is a sparse vector that stores only non-zero entries.
///
/// Entries are kept as two parallel arrays, `inds` and `vals`,
/// and `inds` is strictly ascending. Any index not present is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVec<N = f64>
where
    N: Num + Copy,
{
    inds: Vec<u32>,
    vals: Vec<N>,
}

impl<N> SparseVec<N>
where
    N: Num + Copy,
{
    /// Build from unsorted `(index, value)` pairs.
    /// Duplicate indices are summed in input order; zero results are dropped.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, N)>,
        N: Default,
    {
        let (mut inds, mut vals): (Vec<u32>, Vec<N>) = pairs.into_iter().unzip();
        radix_sort_u32_soa(&mut inds, &mut vals);

        let mut out = Self {
            inds: Vec::with_capacity(inds.len()),
            vals: Vec::with_capacity(vals.len()),
        };
        for (idx, val) in inds.into_iter().zip(vals) {
            match out.inds.last() {
                Some(&last) if last == idx => {
                    if let Some(acc) = out.vals.last_mut() {
                        *acc = *acc + val;
                    }
                }
                _ => {
                    out.inds.push(idx);
                    out.vals.push(val);
                }
            }
        }
        out.retain_non_zero();
        out.inds.shrink_to_fit();
        out.vals.shrink_to_fit();
        out
    }

    fn retain_non_zero(&mut self) {
        let mut w = 0;
        for r in 0..self.inds.len() {
            if !self.vals[r].is_zero() {
                self.inds[w] = self.inds[r];
                self.vals[w] = self.vals[r];
                w += 1;
            }
        }
        self.inds.truncate(w);
        self.vals.truncate(w);
    }

    /// number of non-zero entries
    #[inline]
    pub fn nnz(&self) -> usize {
        self.inds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inds.is_empty()
    }

    #[inline]
    pub fn raw_iter(&self) -> impl Iterator<Item = (u32, N)> + '_ {
        self.inds.iter().copied().zip(self.vals.iter().copied())
    }
}

impl<N> SparseVec<N>
where
    N: Num + Copy + Into<f64>,
{
    /// dot product by merge walk over both index lists
    pub fn dot(&self, other: &Self) -> f64 {
        let mut result = 0_f64;
        let (mut i, mut j) = (0, 0);
        while i < self.inds.len() && j < other.inds.len() {
            match self.inds[i].cmp(&other.inds[j]) {
                Ordering::Equal => {
                    result += self.vals[i].into() * other.vals[j].into();
                    i += 1;
                    j += 1;
                }
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
            }
        }
        result
    }

    #[inline]
    pub fn norm_sq(&self) -> f64 {
        self.vals
            .iter()
            .map(|v| {
                let v: f64 = (*v).into();
                v * v
            })
            .sum()
    }
}

/// Cosine similarity from a dot product and two precomputed squared norms.
/// cosθ = A・B / sqrt(|A|^2 |B|^2)
///
/// Taking one sqrt of the product keeps identical vectors at exactly 1.0.
/// Returns 0 when either norm is 0, and clamps into [0, 1].
#[inline]
pub fn cosine_from_parts(dot: f64, norm_sq_a: f64, norm_sq_b: f64) -> f64 {
    if norm_sq_a <= 0.0 || norm_sq_b <= 0.0 {
        return 0.0;
    }
    let score = dot / (norm_sq_a * norm_sq_b).sqrt();
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}
