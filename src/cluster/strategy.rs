use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cluster::{
    agglomerative::ClusterId,
    config::ClusterConfig,
    profile::{ClusterProfile, DominantCode},
};

/// Output record for one finished cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    /// `strategy-<run timestamp>-<ordinal>`, stable for a given run
    pub id: String,
    pub cluster_id: ClusterId,
    pub name: String,
    pub member_ids: Vec<String>,
    pub top_terms: Vec<String>,
    pub dominant_codes: Vec<DominantCode>,
    /// intra-cluster similarity of the cluster
    pub strength: f64,
    /// summed cross-reference count
    pub relevance: u64,
}

/// Strategy id for the `ordinal`-th descriptor (1-based) of a run
pub fn strategy_id(run_at: DateTime<Utc>, ordinal: usize) -> String {
    format!("strategy-{}-{:03}", run_at.format("%Y%m%dT%H%M%SZ"), ordinal)
}

/// Rank profiles by relevance (descending, then cluster id)
/// and emit one descriptor each. Performs no I/O.
pub fn emit(
    mut profiles: Vec<ClusterProfile>,
    run_at: DateTime<Utc>,
    config: &ClusterConfig,
) -> Vec<StrategyDescriptor> {
    profiles.sort_by(|a, b| b.relevance.cmp(&a.relevance).then_with(|| a.id.cmp(&b.id)));
    profiles
        .into_iter()
        .enumerate()
        .map(|(pos, profile)| StrategyDescriptor {
            id: strategy_id(run_at, pos + 1),
            cluster_id: profile.id,
            name: profile.name,
            member_ids: profile.member_ids,
            top_terms: profile
                .centroid_terms
                .into_iter()
                .take(config.strategy_terms)
                .map(|t| t.term)
                .collect(),
            dominant_codes: profile.dominant_codes,
            strength: profile.intra_similarity,
            relevance: profile.relevance,
        })
        .collect()
}
