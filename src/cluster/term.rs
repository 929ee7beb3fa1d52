use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cluster::{
    config::{ClusterConfig, FailurePolicy},
    error::{ClusterError, Result, TermStatsError},
};

/// Statistics of one term inside one field of one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermStat {
    /// occurrences of the term in this field
    pub term_freq: u32,
    /// number of indexed documents containing the term
    pub doc_freq: u64,
}

impl TermStat {
    pub fn new(term_freq: u32, doc_freq: u64) -> Self {
        Self { term_freq, doc_freq }
    }
}

pub type FieldTerms = IndexMap<String, TermStat>;

/// Term statistics for one document, decoded once at the service boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermStatsResponse {
    /// total documents in the index
    pub total_docs: u64,
    /// field name -> term -> stats
    #[serde(default)]
    pub fields: IndexMap<String, FieldTerms>,
}

impl TermStatsResponse {
    pub fn new(total_docs: u64) -> Self {
        Self {
            total_docs,
            fields: IndexMap::new(),
        }
    }

    /// Add a term to a field, builder style
    pub fn with_term(mut self, field: &str, term: &str, term_freq: u32, doc_freq: u64) -> Self {
        self.fields
            .entry(field.to_string())
            .or_default()
            .insert(term.to_string(), TermStat::new(term_freq, doc_freq));
        self
    }
}

/// Term-statistics lookup keyed by document id.
///
/// - `Ok(Some(_))`: the index has the document
/// - `Ok(None)`: the index has no record for it
/// - `Err(_)`: the call itself failed
///
/// Retry policy belongs to the implementation, not to the caller.
pub trait TermStatsService: Send + Sync {
    fn term_stats(
        &self,
        doc_id: &str,
        fields: &[&str],
    ) -> std::result::Result<Option<TermStatsResponse>, TermStatsError>;
}

/// In-memory term statistics, for replaying captured index responses
#[derive(Debug, Clone, Default)]
pub struct InMemoryTermStats {
    records: HashMap<String, TermStatsResponse>,
    failing: HashSet<String>,
}

impl InMemoryTermStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc_id: impl Into<String>, response: TermStatsResponse) -> &mut Self {
        self.records.insert(doc_id.into(), response);
        self
    }

    /// Make every lookup of `doc_id` return an error
    pub fn fail_on(&mut self, doc_id: impl Into<String>) -> &mut Self {
        self.failing.insert(doc_id.into());
        self
    }
}

impl TermStatsService for InMemoryTermStats {
    fn term_stats(
        &self,
        doc_id: &str,
        fields: &[&str],
    ) -> std::result::Result<Option<TermStatsResponse>, TermStatsError> {
        if self.failing.contains(doc_id) {
            return Err(format!("term statistics lookup failed for {doc_id}").into());
        }
        Ok(self.records.get(doc_id).map(|record| {
            let mut response = TermStatsResponse::new(record.total_docs);
            for field in fields {
                if let Some(terms) = record.fields.get(*field) {
                    response.fields.insert(field.to_string(), terms.clone());
                }
            }
            response
        }))
    }
}

/// Stop-word predicate. Receives an already lowercased term.
pub trait StopWordFilter: Sync {
    fn is_stop_word(&self, term: &str) -> bool;
}

impl<F> StopWordFilter for F
where
    F: Fn(&str) -> bool + Sync,
{
    fn is_stop_word(&self, term: &str) -> bool {
        self(term)
    }
}

/// English function words plus patent boilerplate
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStopWords;

/// sorted for binary search
const DEFAULT_STOP_WORDS: &[&str] = &[
    "about", "above", "according", "after", "also", "among", "and", "another", "any",
    "apparatus", "are", "assembly", "based", "being", "between", "both", "but", "can",
    "claim", "claims", "comprises", "comprising", "configured", "could", "device",
    "devices", "each", "embodiment", "embodiments", "first", "for", "from", "further",
    "has", "have", "having", "herein", "including", "into", "invention", "its", "least",
    "may", "means", "method", "methods", "more", "not", "one", "only", "other", "over",
    "plurality", "second", "such", "system", "systems", "than", "that", "the", "their",
    "then", "there", "thereby", "therefor", "thereof", "these", "third", "this", "those",
    "through", "unit", "upon", "using", "via", "was", "were", "when", "where", "whereby",
    "wherein", "which", "while", "with", "within", "without", "would",
];

impl StopWordFilter for DefaultStopWords {
    fn is_stop_word(&self, term: &str) -> bool {
        DEFAULT_STOP_WORDS.binary_search(&term).is_ok()
    }
}

/// How the lookup for one document went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Extracted,
    /// no index record
    Missing,
    /// service error, degraded to an empty vector
    Failed,
}

/// Weighted terms of one document before vocabulary indexing
#[derive(Debug, Clone, Default)]
pub struct ExtractedTerms {
    /// term -> summed weight, in first-seen order
    pub weights: IndexMap<Box<str>, f64>,
}

/// Turns per-field term statistics into one weighted bag of terms.
///
/// weight = tf * ln(total_docs / (df + 1)) * field boost,
/// summed over fields. Non-positive weights are dropped,
/// so every stored weight is > 0.
pub struct TermExtractor<'a, W>
where
    W: StopWordFilter + ?Sized,
{
    config: &'a ClusterConfig,
    stop_words: &'a W,
}

impl<'a, W> TermExtractor<'a, W>
where
    W: StopWordFilter + ?Sized,
{
    pub fn new(config: &'a ClusterConfig, stop_words: &'a W) -> Self {
        Self { config, stop_words }
    }

    /// Lowercased term if it survives the length and stop-word checks
    pub fn accept(&self, term: &str) -> Option<String> {
        let lower = term.to_lowercase();
        if lower.chars().count() < self.config.min_term_len {
            return None;
        }
        if self.stop_words.is_stop_word(&lower) {
            return None;
        }
        Some(lower)
    }

    /// Weigh one decoded response
    pub fn weigh(&self, response: &TermStatsResponse) -> ExtractedTerms {
        let mut weights: IndexMap<Box<str>, f64> = IndexMap::new();
        let total = response.total_docs as f64;
        for field in &self.config.fields {
            let Some(terms) = response.fields.get(&field.name) else {
                continue;
            };
            for (term, stat) in terms {
                let Some(term) = self.accept(term) else {
                    continue;
                };
                let idf = (total / (stat.doc_freq as f64 + 1.0)).ln();
                let weight = stat.term_freq as f64 * idf * field.boost;
                if weight.is_finite() && weight > 0.0 {
                    *weights.entry(term.into_boxed_str()).or_insert(0.0) += weight;
                }
            }
        }
        ExtractedTerms { weights }
    }

    /// Look up and weigh one document.
    /// Missing records and (under `Degrade`) service errors give an empty bag.
    pub fn extract<S>(&self, service: &S, doc_id: &str) -> Result<(ExtractedTerms, ExtractionOutcome)>
    where
        S: TermStatsService + ?Sized,
    {
        let fields = self.config.field_names();
        match service.term_stats(doc_id, &fields) {
            Ok(Some(response)) => Ok((self.weigh(&response), ExtractionOutcome::Extracted)),
            Ok(None) => {
                warn!(doc_id, "no term statistics in index; document clusters with an empty vector");
                Ok((ExtractedTerms::default(), ExtractionOutcome::Missing))
            }
            Err(source) => match self.config.on_service_error {
                FailurePolicy::Degrade => {
                    warn!(doc_id, error = %source, "term statistics call failed; treating as missing");
                    Ok((ExtractedTerms::default(), ExtractionOutcome::Failed))
                }
                FailurePolicy::Abort => Err(ClusterError::TermStatistics {
                    doc_id: doc_id.to_string(),
                    source,
                }),
            },
        }
    }
}
