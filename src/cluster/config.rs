use serde::{Deserialize, Serialize};

use crate::cluster::error::{ClusterError, Result};

/// How many clusters the merge loop stops at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterTarget {
    /// Fixed number of clusters
    Count(usize),
    /// Desired average cluster size; the count is `ceil(n / size)`
    AverageSize(usize),
}

impl ClusterTarget {
    /// Resolve the target count for `doc_num` documents.
    /// Always at least 1 when there is at least one document.
    pub fn resolve(&self, doc_num: usize) -> usize {
        if doc_num == 0 {
            return 0;
        }
        match *self {
            ClusterTarget::Count(count) => count,
            ClusterTarget::AverageSize(size) => doc_num.div_ceil(size.max(1)).max(1),
        }
    }
}

/// Indexed field and the multiplier applied to its term weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBoost {
    pub name: String,
    pub boost: f64,
}

impl FieldBoost {
    pub fn new(name: impl Into<String>, boost: f64) -> Self {
        Self { name: name.into(), boost }
    }
}

/// What to do when the term-statistics service returns an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Treat the document like one with no index record (empty vector)
    #[default]
    Degrade,
    /// Stop the run with `ClusterError::TermStatistics`
    Abort,
}

/// Tunables for one clustering run.
///
/// Deserializes from partial JSON; missing keys take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub target: ClusterTarget,
    pub fields: Vec<FieldBoost>,
    /// terms shorter than this (in chars) are discarded
    pub min_term_len: usize,
    /// K: centroid terms kept per cluster
    pub centroid_terms: usize,
    /// M: dominant code prefixes kept per cluster
    pub dominant_codes: usize,
    pub code_prefix_len: usize,
    pub max_name_len: usize,
    /// top terms copied into each strategy descriptor
    pub strategy_terms: usize,
    pub parallel_extraction: bool,
    pub on_service_error: FailurePolicy,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            target: ClusterTarget::AverageSize(5),
            fields: vec![FieldBoost::new("title", 2.0), FieldBoost::new("text", 1.0)],
            min_term_len: 3,
            centroid_terms: 15,
            dominant_codes: 5,
            code_prefix_len: 4,
            max_name_len: 60,
            strategy_terms: 10,
            parallel_extraction: false,
            on_service_error: FailurePolicy::Degrade,
        }
    }
}

impl ClusterConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_target(mut self, target: ClusterTarget) -> Self {
        self.target = target;
        self
    }

    /// Check every tunable before any work starts
    pub fn validate(&self) -> Result<()> {
        match self.target {
            ClusterTarget::Count(0) | ClusterTarget::AverageSize(0) => {
                return Err(ClusterError::InvalidTargetClusterCount(0));
            }
            _ => {}
        }
        if self.fields.is_empty() {
            return Err(ClusterError::InvalidConfig("at least one field is required".into()));
        }
        if let Some(f) = self.fields.iter().find(|f| !(f.boost.is_finite() && f.boost > 0.0)) {
            return Err(ClusterError::InvalidConfig(format!(
                "field `{}` has non-positive boost {}",
                f.name, f.boost
            )));
        }
        if self.centroid_terms == 0 || self.dominant_codes == 0 {
            return Err(ClusterError::InvalidConfig("top-K limits must be > 0".into()));
        }
        if self.code_prefix_len == 0 || self.max_name_len == 0 {
            return Err(ClusterError::InvalidConfig(
                "code prefix and name lengths must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}
