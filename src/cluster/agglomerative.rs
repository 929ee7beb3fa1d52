use std::{cmp::Ordering, collections::HashMap, fmt};

use ahash::RandomState;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cluster::{
    error::{ClusterError, Result},
    similarity::SimilarityMatrix,
};

/// Cluster identifier.
/// Singletons take the index of their document; merged clusters
/// get the next free id, so ids grow with merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// An active or finished cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    /// document indices, ascending, never empty
    pub members: Vec<usize>,
    /// average-linkage similarity at which this cluster was formed
    /// (0.0 for singletons)
    pub intra_similarity: f64,
}

impl Cluster {
    fn singleton(doc_idx: usize) -> Self {
        Self {
            id: ClusterId(doc_idx as u32),
            members: vec![doc_idx],
            intra_similarity: 0.0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// One step of the merge history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeStep {
    pub left: ClusterId,
    pub right: ClusterId,
    pub merged: ClusterId,
    pub similarity: f64,
}

/// Final clusters (ordered by id) plus the merges that produced them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    pub clusters: Vec<Cluster>,
    pub merges: Vec<MergeStep>,
}

/// Candidate merge: (left, right, average linkage), left < right
type PairScore = (ClusterId, ClusterId, f64);

/// Higher linkage wins; equal linkage goes to the smaller (left, right) pair.
/// This is a total order, so any reduction tree picks the same pair.
#[inline]
fn better(x: PairScore, y: PairScore) -> PairScore {
    // adding +0.0 folds -0.0 into +0.0 so signed zeros tie
    match (x.2 + 0.0).total_cmp(&(y.2 + 0.0)) {
        Ordering::Greater => x,
        Ordering::Less => y,
        Ordering::Equal => {
            if (x.0, x.1) <= (y.0, y.1) {
                x
            } else {
                y
            }
        }
    }
}

#[inline]
fn pair_key(a: ClusterId, b: ClusterId) -> (ClusterId, ClusterId) {
    if a < b { (a, b) } else { (b, a) }
}

/// Hierarchical agglomerative clustering with average linkage
/// over a precomputed similarity matrix.
///
/// Linkage values of untouched cluster pairs are kept between iterations;
/// pairs involving a new cluster are recomputed from the matrix in member
/// order, which yields exactly the value a full rescan would.
pub struct AgglomerativeClusterer<'m> {
    matrix: &'m SimilarityMatrix,
}

impl<'m> AgglomerativeClusterer<'m> {
    pub fn new(matrix: &'m SimilarityMatrix) -> Self {
        Self { matrix }
    }

    /// Merge until `target` clusters remain.
    ///
    /// - no documents: zero clusters
    /// - `target >= n`: every document stays a singleton
    /// - `target == 0`: rejected before any merge
    pub fn run(&self, target: usize) -> Result<Clustering> {
        let n = self.matrix.len();
        if n == 0 {
            return Ok(Clustering::default());
        }
        if target == 0 {
            return Err(ClusterError::InvalidTargetClusterCount(target));
        }

        let mut active: IndexMap<ClusterId, Cluster> = (0..n)
            .map(|i| {
                let c = Cluster::singleton(i);
                (c.id, c)
            })
            .collect();
        let mut linkage: HashMap<(ClusterId, ClusterId), f64, RandomState> =
            HashMap::with_capacity_and_hasher(n * n.saturating_sub(1) / 2, RandomState::new());
        for i in 0..n {
            for j in i + 1..n {
                linkage.insert((ClusterId(i as u32), ClusterId(j as u32)), self.matrix.get(i, j));
            }
        }

        let mut next_id = n as u32;
        let mut merges = Vec::with_capacity(n.saturating_sub(target));

        while active.len() > target {
            let best = linkage
                .par_iter()
                .map(|(&(a, b), &s)| (a, b, s))
                .reduce_with(better);
            // active.len() > target >= 1 means at least one pair exists
            let Some((left, right, similarity)) = best else {
                break;
            };

            let (Some(a), Some(b)) = (active.shift_remove(&left), active.shift_remove(&right)) else {
                break;
            };
            let merged = Cluster {
                id: ClusterId(next_id),
                members: merge_sorted(&a.members, &b.members),
                intra_similarity: similarity,
            };
            next_id += 1;

            linkage.retain(|&(x, y), _| x != left && x != right && y != left && y != right);
            let fresh: Vec<(ClusterId, f64)> = active
                .par_values()
                .map(|other| (other.id, self.matrix.average_linkage(&other.members, &merged.members)))
                .collect();
            for (other, s) in fresh {
                linkage.insert(pair_key(other, merged.id), s);
            }

            debug!(
                left = %left,
                right = %right,
                merged = %merged.id,
                similarity,
                size = merged.len(),
                remaining = active.len() + 1,
                "clusters merged"
            );
            merges.push(MergeStep {
                left,
                right,
                merged: merged.id,
                similarity,
            });
            active.insert(merged.id, merged);
        }

        let mut clusters: Vec<Cluster> = active.into_values().collect();
        clusters.sort_by_key(|c| c.id);
        info!(docs = n, clusters = clusters.len(), merges = merges.len(), "agglomerative clustering finished");
        Ok(Clustering { clusters, merges })
    }
}

/// union of two ascending, disjoint index lists
fn merge_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] <= b[j] {
            out.push(a[i]);
            i += 1;
        } else {
            out.push(b[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}
