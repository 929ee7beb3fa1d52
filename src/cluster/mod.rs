pub mod agglomerative;
pub mod candidate;
pub mod config;
pub mod corpus;
pub mod error;
pub mod profile;
pub mod serde;
pub mod similarity;
pub mod strategy;
pub mod term;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::cluster::{
    agglomerative::{AgglomerativeClusterer, Clustering},
    candidate::CandidateDocument,
    config::ClusterConfig,
    corpus::ExtractedCorpus,
    error::Result,
    profile::{ClusterProfile, CodeLabels, Profiler},
    similarity::SimilarityMatrix,
    strategy::StrategyDescriptor,
    term::{StopWordFilter, TermStatsService},
};

/// Context of one clustering run.
///
/// Owns every cache the run needs (vocabulary, term vectors, similarity
/// matrix). Nothing outlives it: dropping the run discards the caches,
/// and `into_strategies` consumes it.
#[derive(Debug, Clone)]
pub struct ClusterRun {
    config: ClusterConfig,
    corpus: ExtractedCorpus,
    matrix: SimilarityMatrix,
    run_at: DateTime<Utc>,
}

impl ClusterRun {
    /// Validate the config, load the candidates, extract every term vector
    /// and build the similarity matrix.
    ///
    /// An invalid target count fails here, before any lookup is made.
    pub fn new<S, W>(
        config: ClusterConfig,
        candidates: Vec<CandidateDocument>,
        service: &S,
        stop_words: &W,
    ) -> Result<Self>
    where
        S: TermStatsService + ?Sized,
        W: StopWordFilter + ?Sized,
    {
        config.validate()?;
        let corpus = ExtractedCorpus::extract(&config, candidates, service, stop_words)?;
        Ok(Self::assemble(config, corpus))
    }

    /// Start a run from term vectors the caller already holds
    pub fn from_corpus(config: ClusterConfig, corpus: ExtractedCorpus) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, corpus))
    }

    fn assemble(config: ClusterConfig, corpus: ExtractedCorpus) -> Self {
        let matrix = SimilarityMatrix::build(&corpus);
        Self {
            config,
            corpus,
            matrix,
            run_at: Utc::now(),
        }
    }

    /// Override the run timestamp that strategy ids derive from
    pub fn with_run_time(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = run_at;
        self
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn corpus(&self) -> &ExtractedCorpus {
        &self.corpus
    }

    pub fn similarity(&self) -> &SimilarityMatrix {
        &self.matrix
    }

    /// Target cluster count resolved for the loaded documents
    pub fn target(&self) -> usize {
        self.config.target.resolve(self.corpus.doc_num())
    }

    pub fn cluster(&self) -> Result<Clustering> {
        if self.corpus.is_empty() {
            return Ok(Clustering::default());
        }
        AgglomerativeClusterer::new(&self.matrix).run(self.target())
    }

    pub fn profile<L>(&self, clustering: &Clustering, labels: &L) -> Vec<ClusterProfile>
    where
        L: CodeLabels + ?Sized,
    {
        Profiler::new(&self.config, &self.corpus, labels).profile_all(&clustering.clusters)
    }

    /// Cluster, profile and rank. Consumes the run.
    pub fn into_strategies<L>(self, labels: &L) -> Result<Vec<StrategyDescriptor>>
    where
        L: CodeLabels + ?Sized,
    {
        let clustering = self.cluster()?;
        let profiles = self.profile(&clustering, labels);
        let descriptors = strategy::emit(profiles, self.run_at, &self.config);
        info!(
            docs = self.corpus.doc_num(),
            strategies = descriptors.len(),
            degraded = self.corpus.report.degraded(),
            "clustering run finished"
        );
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{
        config::{ClusterTarget, FailurePolicy},
        error::ClusterError,
        profile::StaticCodeLabels,
        term::{DefaultStopWords, InMemoryTermStats, TermStatsResponse},
    };
    use proptest::prelude::*;

    /// set RUST_LOG=tech_cluster=debug to see merge steps
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn response(terms: &[(&str, u32)]) -> TermStatsResponse {
        terms
            .iter()
            .fold(TermStatsResponse::new(1000), |r, (t, tf)| r.with_term("text", t, *tf, 9))
    }

    fn config(target: usize) -> ClusterConfig {
        ClusterConfig::default().with_target(ClusterTarget::Count(target))
    }

    fn groups(clustering: &Clustering, run: &ClusterRun) -> Vec<Vec<String>> {
        clustering
            .clusters
            .iter()
            .map(|c| c.members.iter().map(|&i| run.corpus().docs()[i].id.clone()).collect())
            .collect()
    }

    #[test]
    fn identical_documents_merge_with_full_similarity() {
        init_tracing();
        let mut service = InMemoryTermStats::new();
        service
            .insert("A", response(&[("laser", 2), ("mirror", 1)]))
            .insert("B", response(&[("laser", 2), ("mirror", 1)]));
        let run = ClusterRun::new(
            config(1),
            vec![CandidateDocument::new("A"), CandidateDocument::new("B")],
            &service,
            &DefaultStopWords,
        )
        .unwrap();
        let clustering = run.cluster().unwrap();
        assert_eq!(clustering.clusters.len(), 1);
        assert_eq!(clustering.clusters[0].intra_similarity, 1.0);
    }

    #[test]
    fn shared_terms_merge_first_and_outlier_stays_alone() {
        let mut service = InMemoryTermStats::new();
        service
            .insert("A", response(&[("laser", 2), ("mirror", 1)]))
            .insert("B", response(&[("laser", 1), ("mirror", 3)]))
            .insert("C", response(&[("battery", 4)]));
        let run = ClusterRun::new(
            config(2),
            ["A", "B", "C"].iter().map(|id| CandidateDocument::new(*id)).collect(),
            &service,
            &DefaultStopWords,
        )
        .unwrap();
        let clustering = run.cluster().unwrap();
        assert_eq!(groups(&clustering, &run), vec![vec!["C"], vec!["A", "B"]]);
        assert_eq!(clustering.merges.len(), 1);
    }

    #[test]
    fn document_without_index_record_still_clusters_once() {
        let mut service = InMemoryTermStats::new();
        service
            .insert("A", response(&[("laser", 2)]))
            .insert("B", response(&[("laser", 2)]));
        let candidates = vec![
            CandidateDocument::new("A").with_codes(&["H01S 3/00"]),
            CandidateDocument::new("B").with_codes(&["H01S 5/00"]),
            CandidateDocument::new("C"),
        ];
        let run = ClusterRun::new(config(2), candidates, &service, &DefaultStopWords).unwrap();
        assert_eq!(run.corpus().report().missing, 1);

        let clustering = run.cluster().unwrap();
        let all: Vec<String> = groups(&clustering, &run).into_iter().flatten().collect();
        assert_eq!(all.iter().filter(|id| *id == "C").count(), 1);

        let profiles = run.profile(&clustering, &StaticCodeLabels);
        let lonely = profiles.iter().find(|p| p.member_ids == vec!["C"]).unwrap();
        assert!(lonely.dominant_codes.is_empty());
        assert!(lonely.centroid_terms.is_empty());
    }

    #[test]
    fn failing_service_is_explicitly_degraded() {
        init_tracing();
        let mut service = InMemoryTermStats::new();
        service.insert("A", response(&[("laser", 2)])).fail_on("B");
        let candidates = vec![CandidateDocument::new("A"), CandidateDocument::new("B")];

        let run = ClusterRun::new(config(2), candidates.clone(), &service, &DefaultStopWords).unwrap();
        assert_eq!(run.corpus().report().failed, 1);
        assert_eq!(run.into_strategies(&StaticCodeLabels).unwrap().len(), 2);

        let abort = ClusterConfig { on_service_error: FailurePolicy::Abort, ..config(2) };
        assert!(matches!(
            ClusterRun::new(abort, candidates, &service, &DefaultStopWords),
            Err(ClusterError::TermStatistics { .. })
        ));
    }

    #[test]
    fn centroid_ties_break_alphabetically_end_to_end() {
        let corpus = ExtractedCorpus::from_weights(vec![
            (CandidateDocument::new("A"), vec![("foo", 2.0), ("bar", 1.0)]),
            (CandidateDocument::new("B"), vec![("foo", 1.0), ("baz", 3.0)]),
        ]);
        let run = ClusterRun::from_corpus(config(1), corpus).unwrap();
        let out = run.into_strategies(&StaticCodeLabels).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].top_terms, vec!["baz", "foo", "bar"]);
    }

    #[test]
    fn empty_candidate_list_gives_no_descriptors() {
        let service = InMemoryTermStats::new();
        let run = ClusterRun::new(ClusterConfig::default(), vec![], &service, &DefaultStopWords).unwrap();
        assert_eq!(run.target(), 0);
        assert!(run.into_strategies(&StaticCodeLabels).unwrap().is_empty());
    }

    #[test]
    fn zero_target_fails_before_any_lookup() {
        struct Panicking;
        impl TermStatsService for Panicking {
            fn term_stats(
                &self,
                _: &str,
                _: &[&str],
            ) -> std::result::Result<Option<TermStatsResponse>, crate::cluster::error::TermStatsError> {
                panic!("lookup must not happen");
            }
        }
        let result = ClusterRun::new(config(0), vec![CandidateDocument::new("A")], &Panicking, &DefaultStopWords);
        assert!(matches!(result, Err(ClusterError::InvalidTargetClusterCount(0))));
    }

    #[test]
    fn descriptors_rank_by_relevance() {
        let mut service = InMemoryTermStats::new();
        service
            .insert("A", response(&[("laser", 2)]))
            .insert("B", response(&[("battery", 2)]));
        let candidates = vec![
            CandidateDocument::new("A").with_cross_refs(1),
            CandidateDocument::new("B").with_cross_refs(7),
        ];
        let run = ClusterRun::new(config(2), candidates, &service, &DefaultStopWords).unwrap();
        let out = run.into_strategies(&StaticCodeLabels).unwrap();
        assert_eq!(out[0].member_ids, vec!["B"]);
        assert_eq!(out[0].relevance, 7);
        assert!(out[0].id.ends_with("-001"));
    }

    fn term_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("the".to_string()),
            Just("wherein".to_string()),
            Just("ab".to_string()),
            "[a-e]{1,6}",
        ]
    }

    proptest! {
        #[test]
        fn runs_are_deterministic_and_filter_terms(
            docs in prop::collection::vec(prop::collection::vec((term_strategy(), 1u32..5), 0..6), 0..10),
            target in 1usize..6,
        ) {
            let mut service = InMemoryTermStats::new();
            let mut candidates = Vec::new();
            for (i, terms) in docs.iter().enumerate() {
                let id = format!("D{i}");
                let resp = terms
                    .iter()
                    .fold(TermStatsResponse::new(500), |r, (t, tf)| r.with_term("text", t, *tf, 3));
                service.insert(id.clone(), resp);
                candidates.push(CandidateDocument::new(id));
            }
            let run_at = Utc::now();
            let first = ClusterRun::new(config(target), candidates.clone(), &service, &DefaultStopWords)
                .unwrap()
                .with_run_time(run_at)
                .into_strategies(&StaticCodeLabels)
                .unwrap();
            let second = ClusterRun::new(config(target), candidates, &service, &DefaultStopWords)
                .unwrap()
                .with_run_time(run_at)
                .into_strategies(&StaticCodeLabels)
                .unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.len(), target.min(docs.len()));

            let mut members: Vec<String> = first.iter().flat_map(|d| d.member_ids.clone()).collect();
            members.sort();
            let mut expected: Vec<String> = (0..docs.len()).map(|i| format!("D{i}")).collect();
            expected.sort();
            prop_assert_eq!(members, expected);

            for term in first.iter().flat_map(|d| d.top_terms.iter()) {
                prop_assert!(term.chars().count() >= 3);
                prop_assert!(!DefaultStopWords.is_stop_word(term));
            }
        }
    }
}
