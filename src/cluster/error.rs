//! Error types for clustering runs.

use thiserror::Error;

/// Error returned by a term-statistics client.
/// Any client error type can be boxed into it.
pub type TermStatsError = Box<dyn std::error::Error + Send + Sync>;

/// Errors for clustering runs.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The configured target cluster count (or average size) is zero.
    #[error("Target cluster count must be > 0, got {0}")]
    InvalidTargetClusterCount(usize),

    /// Any other configuration value out of range.
    #[error("Invalid cluster config: {0}")]
    InvalidConfig(String),

    /// A term-statistics call failed and the failure policy is `Abort`.
    #[error("Term statistics failed for document {doc_id}: {source}")]
    TermStatistics {
        doc_id: String,
        #[source]
        source: TermStatsError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
