use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    cluster::{
        candidate::CandidateDocument,
        config::ClusterConfig,
        error::Result,
        term::{ExtractedTerms, ExtractionOutcome, StopWordFilter, TermExtractor, TermStatsService},
    },
    utils::math::sparse::SparseVec,
};

/// Sparse term vector; indices point into `ExtractedCorpus::vocab`
pub type TermVector = SparseVec<f64>;

/// Counters for how extraction went over the whole candidate set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub extracted: usize,
    pub missing: usize,
    pub failed: usize,
    /// candidates dropped because their id was already loaded
    pub duplicates: usize,
}

impl ExtractionReport {
    fn record(&mut self, outcome: ExtractionOutcome) {
        match outcome {
            ExtractionOutcome::Extracted => self.extracted += 1,
            ExtractionOutcome::Missing => self.missing += 1,
            ExtractionOutcome::Failed => self.failed += 1,
        }
    }

    /// documents that ended up with a degraded (empty) vector
    pub fn degraded(&self) -> usize {
        self.missing + self.failed
    }
}

/// Every document of one run with its term vector.
///
/// Document `i` (load order) owns `docs[i]`, `vectors[i]` and `norm_sqs[i]`.
/// Built once; read-only afterwards. Only `extract` and `from_weights`
/// construct it, which keeps the per-document arrays the same length.
#[derive(Debug, Clone, Default)]
pub struct ExtractedCorpus {
    pub(crate) docs: Vec<CandidateDocument>,
    /// term dimension: term -> index
    pub(crate) vocab: IndexSet<Box<str>>,
    pub(crate) vectors: Vec<TermVector>,
    /// squared Euclidean norm of each vector
    pub(crate) norm_sqs: Vec<f64>,
    pub(crate) report: ExtractionReport,
}

impl ExtractedCorpus {
    /// Load candidates and extract one term vector per document.
    ///
    /// Duplicate ids keep the first occurrence. Lookups run sequentially
    /// unless `parallel_extraction` is set; either way the vocabulary is
    /// assigned in load order, so the result is identical.
    pub fn extract<S, W>(
        config: &ClusterConfig,
        candidates: Vec<CandidateDocument>,
        service: &S,
        stop_words: &W,
    ) -> Result<Self>
    where
        S: TermStatsService + ?Sized,
        W: StopWordFilter + ?Sized,
    {
        let mut report = ExtractionReport::default();
        let docs = dedup_candidates(candidates, &mut report);
        let extractor = TermExtractor::new(config, stop_words);

        let extracted: Vec<(ExtractedTerms, ExtractionOutcome)> = if config.parallel_extraction {
            docs.par_iter()
                .map(|doc| extractor.extract(service, &doc.id))
                .collect::<Result<Vec<_>>>()?
        } else {
            docs.iter()
                .map(|doc| extractor.extract(service, &doc.id))
                .collect::<Result<Vec<_>>>()?
        };

        let mut vocab: IndexSet<Box<str>> = IndexSet::new();
        let mut vectors = Vec::with_capacity(docs.len());
        let mut norm_sqs = Vec::with_capacity(docs.len());
        for (terms, outcome) in extracted {
            report.record(outcome);
            let pairs: Vec<(u32, f64)> = terms
                .weights
                .into_iter()
                .map(|(term, weight)| {
                    let (idx, _) = vocab.insert_full(term);
                    (idx as u32, weight)
                })
                .collect();
            let vector = TermVector::from_pairs(pairs);
            norm_sqs.push(vector.norm_sq());
            vectors.push(vector);
        }

        info!(
            docs = docs.len(),
            vocab = vocab.len(),
            nnz = vectors.iter().map(|v: &TermVector| v.nnz()).sum::<usize>(),
            extracted = report.extracted,
            missing = report.missing,
            failed = report.failed,
            "term vectors extracted"
        );

        Ok(Self {
            docs,
            vocab,
            vectors,
            norm_sqs,
            report,
        })
    }

    /// Build directly from precomputed weights, one bag per document.
    /// Used when the caller already holds term vectors.
    pub fn from_weights<T>(docs: Vec<(CandidateDocument, Vec<(T, f64)>)>) -> Self
    where
        T: AsRef<str>,
    {
        let mut corpus = Self::default();
        for (doc, weights) in docs {
            let pairs: Vec<(u32, f64)> = weights
                .iter()
                .filter(|(_, w)| w.is_finite() && *w > 0.0)
                .map(|(term, w)| {
                    let (idx, _) = corpus.vocab.insert_full(term.as_ref().into());
                    (idx as u32, *w)
                })
                .collect();
            let vector = TermVector::from_pairs(pairs);
            corpus.norm_sqs.push(vector.norm_sq());
            corpus.vectors.push(vector);
            corpus.docs.push(doc);
            corpus.report.extracted += 1;
        }
        corpus
    }

    #[inline]
    pub fn doc_num(&self) -> usize {
        self.docs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// loaded documents, in load order
    pub fn docs(&self) -> &[CandidateDocument] {
        &self.docs
    }

    pub fn vocab(&self) -> &IndexSet<Box<str>> {
        &self.vocab
    }

    pub fn vectors(&self) -> &[TermVector] {
        &self.vectors
    }

    pub fn report(&self) -> ExtractionReport {
        self.report
    }

    /// term text for a vocabulary index
    #[inline]
    pub fn term(&self, idx: u32) -> Option<&str> {
        self.vocab.get_index(idx as usize).map(|t| &**t)
    }

    /// Term vector as `term -> weight`, for inspection and tests
    pub fn weights_of(&self, doc_idx: usize) -> IndexMap<&str, f64> {
        self.vectors
            .get(doc_idx)
            .map(|v| {
                v.raw_iter()
                    .filter_map(|(idx, w)| self.term(idx).map(|t| (t, w)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn dedup_candidates(
    candidates: Vec<CandidateDocument>,
    report: &mut ExtractionReport,
) -> Vec<CandidateDocument> {
    let mut seen: IndexSet<String> = IndexSet::with_capacity(candidates.len());
    let mut docs = Vec::with_capacity(candidates.len());
    for doc in candidates {
        if seen.insert(doc.id.clone()) {
            docs.push(doc);
        } else {
            warn!(doc_id = %doc.id, "duplicate candidate id; keeping first occurrence");
            report.duplicates += 1;
        }
    }
    debug!(loaded = docs.len(), duplicates = report.duplicates, "candidates loaded");
    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::term::{DefaultStopWords, InMemoryTermStats, TermStatsResponse};

    fn service() -> InMemoryTermStats {
        let mut service = InMemoryTermStats::new();
        service
            .insert(
                "A",
                TermStatsResponse::new(100)
                    .with_term("title", "laser", 1, 4)
                    .with_term("text", "mirror", 2, 9),
            )
            .insert("B", TermStatsResponse::new(100).with_term("text", "mirror", 1, 9))
            .fail_on("C");
        service
    }

    fn candidates() -> Vec<CandidateDocument> {
        vec![
            CandidateDocument::new("A"),
            CandidateDocument::new("B"),
            CandidateDocument::new("C"),
            CandidateDocument::new("D"),
            CandidateDocument::new("A"),
        ]
    }

    #[test]
    fn extraction_indexes_vocab_in_load_order() {
        let config = ClusterConfig::default();
        let corpus = ExtractedCorpus::extract(&config, candidates(), &service(), &DefaultStopWords).unwrap();

        assert_eq!(corpus.doc_num(), 4);
        assert_eq!(corpus.vocab.iter().map(|t| &**t).collect::<Vec<_>>(), vec!["laser", "mirror"]);
        assert_eq!(
            corpus.report,
            ExtractionReport { extracted: 2, missing: 1, failed: 1, duplicates: 1 }
        );
        assert_eq!(corpus.report.degraded(), 2);
        assert!(corpus.vectors[2].is_empty());
        assert_eq!(corpus.norm_sqs[3], 0.0);
        assert!(corpus.weights_of(1).contains_key("mirror"));
    }

    #[test]
    fn parallel_extraction_matches_sequential() {
        let sequential = ClusterConfig::default();
        let parallel = ClusterConfig { parallel_extraction: true, ..ClusterConfig::default() };
        let a = ExtractedCorpus::extract(&sequential, candidates(), &service(), &DefaultStopWords).unwrap();
        let b = ExtractedCorpus::extract(&parallel, candidates(), &service(), &DefaultStopWords).unwrap();
        assert_eq!(a.vocab, b.vocab);
        assert_eq!(a.vectors, b.vectors);
        assert_eq!(a.report, b.report);
    }

    #[test]
    fn per_document_arrays_stay_aligned() {
        let config = ClusterConfig::default();
        let corpus = ExtractedCorpus::extract(&config, candidates(), &service(), &DefaultStopWords).unwrap();
        assert_eq!(corpus.docs().len(), corpus.doc_num());
        assert_eq!(corpus.vectors().len(), corpus.doc_num());
        assert_eq!(corpus.norm_sqs.len(), corpus.doc_num());
        assert_eq!(corpus.docs()[1].id, "B");
        assert_eq!(corpus.report().duplicates, 1);

        let weighted = ExtractedCorpus::from_weights::<&str>(vec![
            (CandidateDocument::new("X"), vec![("laser", 1.0)]),
            (CandidateDocument::new("Y"), vec![]),
        ]);
        assert_eq!(weighted.vectors().len(), 2);
        assert_eq!(weighted.norm_sqs.len(), 2);
        assert_eq!(weighted.vocab().len(), 1);
    }

    #[test]
    fn from_weights_skips_non_positive_weights() {
        let corpus = ExtractedCorpus::from_weights(vec![(
            CandidateDocument::new("X"),
            vec![("foo", 2.0), ("bar", 0.0), ("baz", -1.0)],
        )]);
        assert_eq!(corpus.vocab.len(), 1);
        assert_eq!(corpus.weights_of(0).get("foo"), Some(&2.0));
    }
}
