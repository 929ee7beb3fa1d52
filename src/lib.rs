/// This crate groups ranked candidate documents (patents) into technology
/// clusters by lexical similarity and summarizes each cluster as a strategy.
pub mod cluster;
pub mod utils;

/// Cluster Run
/// The top-level struct of this crate: the context object of one clustering run.
///
/// Internally, it holds:
/// - The loaded candidate documents, each with a stable integer index
/// - The term vocabulary of the run
/// - One sparse weighted term vector per document
/// - The pairwise cosine similarity matrix
///
/// A run is created from a `ClusterConfig`, the candidate list, a
/// `TermStatsService` and a `StopWordFilter`. All vectors and the similarity
/// matrix are built before any clustering starts. `into_strategies` consumes
/// the run and returns the ranked `StrategyDescriptor` list; dropping the run
/// discards every cache, so nothing leaks between runs.
///
/// # Errors
/// An invalid target cluster count is rejected before any term lookup.
/// Missing index records and (by default) failing lookups are not errors:
/// the document clusters with an empty vector.
pub use cluster::ClusterRun;

/// Cluster Configuration
/// Tunables of one run: target cluster count (fixed, or derived from a
/// desired average cluster size), field boosts, minimum term length,
/// centroid/code limits, naming, and the service failure policy.
///
/// # Deserialization
/// Supported. Missing keys take their defaults.
pub use cluster::config::{ClusterConfig, ClusterTarget, FailurePolicy, FieldBoost};

/// Candidate Document
/// One ranked candidate as produced by the upstream ranking stage:
/// id, title, classification codes, cross-reference count and referrers.
pub use cluster::candidate::CandidateDocument;

/// Term Statistics boundary
/// - `TermStatsService`: lookup of per-field term statistics by document id
/// - `TermStatsResponse`: the strongly typed response
/// - `InMemoryTermStats`: a service backed by captured responses
/// - `StopWordFilter` / `DefaultStopWords`: the stop-word predicate
pub use cluster::term::{
    DefaultStopWords, InMemoryTermStats, StopWordFilter, TermStat, TermStatsResponse, TermStatsService,
};

/// Extracted Corpus
/// Documents, vocabulary and term vectors of one run,
/// plus an `ExtractionReport` of how many documents were degraded.
pub use cluster::corpus::{ExtractedCorpus, ExtractionReport};

/// Similarity Matrix
/// Symmetric pairwise cosine similarity in [0, 1], computed once per pair.
pub use cluster::similarity::SimilarityMatrix;

/// Agglomerative Clusterer
/// Average-linkage hierarchical clustering over the similarity matrix.
/// Ties are broken by the smallest pair of cluster ids, so runs are deterministic.
pub use cluster::agglomerative::{AgglomerativeClusterer, Cluster, ClusterId, Clustering, MergeStep};

/// Cluster Profiler
/// Centroid terms, dominant code prefixes, relevance counter,
/// unique referrers and a readable name per finished cluster.
pub use cluster::profile::{ClusterProfile, CodeLabels, Profiler, StaticCodeLabels};

/// Strategy Descriptor
/// Ranked output record per cluster, handed to the caller for persistence.
pub use cluster::strategy::StrategyDescriptor;

/// Errors
pub use cluster::error::{ClusterError, Result};
