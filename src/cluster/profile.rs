use std::collections::{BTreeSet, HashMap};

use ahash::RandomState;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cluster::{
    agglomerative::{Cluster, ClusterId},
    config::ClusterConfig,
    corpus::ExtractedCorpus,
};

/// Descriptive label for a classification-code prefix
pub trait CodeLabels: Sync {
    fn label(&self, prefix: &str) -> Option<&str>;
}

impl CodeLabels for HashMap<String, String> {
    fn label(&self, prefix: &str) -> Option<&str> {
        self.get(prefix).map(|s| s.as_str())
    }
}

impl CodeLabels for IndexMap<String, String> {
    fn label(&self, prefix: &str) -> Option<&str> {
        self.get(prefix).map(|s| s.as_str())
    }
}

/// Built-in CPC subclass labels
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCodeLabels;

/// sorted by prefix for binary search
const CPC_LABELS: &[(&str, &str)] = &[
    ("A61B", "Diagnosis & Surgery"),
    ("A61K", "Medical Preparations"),
    ("A61N", "Electrotherapy & Radiation Therapy"),
    ("B01D", "Separation"),
    ("B01J", "Chemical Processes & Catalysts"),
    ("B29C", "Plastics Shaping"),
    ("B33Y", "Additive Manufacturing"),
    ("B60L", "Electric Vehicle Propulsion"),
    ("B60W", "Vehicle Drive Control"),
    ("B62D", "Motor Vehicles"),
    ("B64C", "Aircraft"),
    ("C01B", "Non-metallic Elements"),
    ("C07D", "Heterocyclic Compounds"),
    ("C07K", "Peptides"),
    ("C12N", "Microorganisms & Enzymes"),
    ("C12Q", "Measuring Processes with Enzymes"),
    ("F03D", "Wind Motors"),
    ("G01N", "Material Analysis"),
    ("G01S", "Radio Direction-finding & Radar"),
    ("G02B", "Optical Elements"),
    ("G05B", "Control Systems"),
    ("G05D", "Control of Non-electric Variables"),
    ("G06F", "Digital Data Processing"),
    ("G06N", "Computing Models & Machine Learning"),
    ("G06Q", "Business Data Processing"),
    ("G06T", "Image Data Processing"),
    ("G06V", "Image & Video Recognition"),
    ("G08G", "Traffic Control"),
    ("G10L", "Speech Processing"),
    ("G11C", "Static Stores"),
    ("G16H", "Healthcare Informatics"),
    ("H01L", "Semiconductor Devices"),
    ("H01M", "Batteries & Fuel Cells"),
    ("H01Q", "Antennas"),
    ("H02J", "Power Supply & Distribution"),
    ("H02M", "Power Conversion"),
    ("H04B", "Transmission"),
    ("H04L", "Digital Information Transmission"),
    ("H04N", "Pictorial Communication"),
    ("H04W", "Wireless Networks"),
    ("H10K", "Organic Electric Devices"),
    ("Y02E", "Clean Energy Technologies"),
];

impl CodeLabels for StaticCodeLabels {
    fn label(&self, prefix: &str) -> Option<&str> {
        CPC_LABELS
            .binary_search_by(|(p, _)| p.cmp(&prefix))
            .ok()
            .map(|pos| CPC_LABELS[pos].1)
    }
}

/// One centroid term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidTerm {
    pub term: String,
    /// summed weight over members
    pub mass: f64,
    /// mass / member count, the ranking key
    pub weight: f64,
}

/// One dominant code prefix with the number of members carrying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominantCode {
    pub prefix: String,
    pub count: usize,
}

/// Derived attributes of one finished cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub id: ClusterId,
    pub member_ids: Vec<String>,
    pub centroid_terms: Vec<CentroidTerm>,
    pub dominant_codes: Vec<DominantCode>,
    /// summed cross-reference count of the members
    pub relevance: u64,
    /// unique referring entities, sorted
    pub referrers: Vec<String>,
    pub intra_similarity: f64,
    pub name: String,
}

/// Derives profiles from finished clusters. Never changes membership.
pub struct Profiler<'a, L>
where
    L: CodeLabels + ?Sized,
{
    config: &'a ClusterConfig,
    corpus: &'a ExtractedCorpus,
    labels: &'a L,
}

impl<'a, L> Profiler<'a, L>
where
    L: CodeLabels + ?Sized,
{
    pub fn new(config: &'a ClusterConfig, corpus: &'a ExtractedCorpus, labels: &'a L) -> Self {
        Self { config, corpus, labels }
    }

    pub fn profile_all(&self, clusters: &[Cluster]) -> Vec<ClusterProfile> {
        clusters.par_iter().map(|c| self.profile(c)).collect()
    }

    pub fn profile(&self, cluster: &Cluster) -> ClusterProfile {
        let centroid_terms = self.centroid_terms(&cluster.members);
        let dominant_codes = self.dominant_codes(&cluster.members);
        let name = self.name(cluster.id, &dominant_codes, &centroid_terms);

        let mut relevance = 0u64;
        let mut referrers: BTreeSet<&str> = BTreeSet::new();
        let mut member_ids = Vec::with_capacity(cluster.members.len());
        for doc in cluster.members.iter().filter_map(|&i| self.corpus.docs.get(i)) {
            relevance = relevance.saturating_add(doc.cross_refs);
            referrers.extend(doc.referrers.iter().map(|r| r.as_str()));
            member_ids.push(doc.id.clone());
        }

        ClusterProfile {
            id: cluster.id,
            member_ids,
            centroid_terms,
            dominant_codes,
            relevance,
            referrers: referrers.into_iter().map(str::to_string).collect(),
            intra_similarity: cluster.intra_similarity,
            name,
        }
    }

    /// Top-K terms by summed weight / member count; ties alphabetical
    pub fn centroid_terms(&self, members: &[usize]) -> Vec<CentroidTerm> {
        let mut mass: HashMap<u32, f64, RandomState> = HashMap::default();
        for &m in members {
            if let Some(vector) = self.corpus.vectors.get(m) {
                for (idx, w) in vector.raw_iter() {
                    *mass.entry(idx).or_insert(0.0) += w;
                }
            }
        }
        let size = members.len().max(1) as f64;
        let mut terms: Vec<CentroidTerm> = mass
            .into_iter()
            .filter_map(|(idx, mass)| {
                self.corpus.term(idx).map(|term| CentroidTerm {
                    term: term.to_string(),
                    mass,
                    weight: mass / size,
                })
            })
            .collect();
        terms.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.term.cmp(&b.term)));
        terms.truncate(self.config.centroid_terms);
        terms
    }

    /// Top-M code prefixes by number of members carrying them; ties by prefix
    pub fn dominant_codes(&self, members: &[usize]) -> Vec<DominantCode> {
        let mut counts: HashMap<String, usize, RandomState> = HashMap::default();
        for doc in members.iter().filter_map(|&i| self.corpus.docs.get(i)) {
            let prefixes: BTreeSet<String> = doc
                .codes
                .iter()
                .filter_map(|code| code_prefix(code, self.config.code_prefix_len))
                .collect();
            for prefix in prefixes {
                *counts.entry(prefix).or_insert(0) += 1;
            }
        }
        let mut codes: Vec<DominantCode> = counts
            .into_iter()
            .map(|(prefix, count)| DominantCode { prefix, count })
            .collect();
        codes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.prefix.cmp(&b.prefix)));
        codes.truncate(self.config.dominant_codes);
        codes
    }

    /// "<label of top code> - <term1>, <term2>", cut to `max_name_len` chars
    pub fn name(&self, id: ClusterId, codes: &[DominantCode], terms: &[CentroidTerm]) -> String {
        let label = codes
            .first()
            .map(|c| self.labels.label(&c.prefix).unwrap_or(c.prefix.as_str()).to_string());
        let top_terms: Vec<&str> = terms.iter().take(2).map(|t| t.term.as_str()).collect();
        let name = match (label, top_terms.is_empty()) {
            (Some(label), false) => format!("{} - {}", label, top_terms.join(", ")),
            (Some(label), true) => label,
            (None, false) => top_terms.join(", "),
            (None, true) => format!("Cluster {}", id.0),
        };
        truncate_chars(&name, self.config.max_name_len)
    }
}

/// First `len` chars of a code with inner whitespace removed
fn code_prefix(code: &str, len: usize) -> Option<String> {
    let prefix: String = code.chars().filter(|c| !c.is_whitespace()).take(len).collect();
    if prefix.is_empty() { None } else { Some(prefix) }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => s[..cut].trim_end().to_string(),
        None => s.to_string(),
    }
}
