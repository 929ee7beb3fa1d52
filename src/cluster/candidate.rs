use serde::{Deserialize, Serialize};

/// One ranked candidate document, as handed over by the ranking stage.
/// Immutable for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDocument {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// classification codes (e.g. CPC `H04L 9/32`)
    #[serde(default)]
    pub codes: Vec<String>,
    /// cross-reference count, summed per cluster as its relevance counter
    #[serde(default)]
    pub cross_refs: u64,
    /// entities referring to this document
    #[serde(default)]
    pub referrers: Vec<String>,
}

impl CandidateDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            codes: Vec::new(),
            cross_refs: 0,
            referrers: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_codes<T: AsRef<str>>(mut self, codes: &[T]) -> Self {
        self.codes = codes.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn with_cross_refs(mut self, cross_refs: u64) -> Self {
        self.cross_refs = cross_refs;
        self
    }

    pub fn with_referrers<T: AsRef<str>>(mut self, referrers: &[T]) -> Self {
        self.referrers = referrers.iter().map(|r| r.as_ref().to_string()).collect();
        self
    }
}
