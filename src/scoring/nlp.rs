use crate::ml::IncidentFeatures;
use crate::models::{Incident, ScoreMethod};
use crate::scoring::CategoryScorer;
use crate::taxonomy::TaxonomySnapshot;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

static NEGATIVE_TOKENS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "failed", "failure", "error", "broken", "down", "outage", "crashed", "unable", "denied",
        "rejected", "timeout", "slow", "stuck", "corrupt", "lost", "breach",
    ]
    .into_iter()
    .collect()
});

static POSITIVE_TOKENS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["resolved", "recovered", "restored", "working", "successful", "completed"]
        .into_iter()
        .collect()
});

/// Stateless linguistic scorer.
///
/// Builds a concept set for the incident (content tokens, recognized system
/// names, an abend marker) and scores each taxonomy node by the overlap
/// coefficient with the node's concept dictionary. Sentiment polarity is
/// computed for the analysis record but does not move category scores.
pub struct NlpAnalyzer;

impl NlpAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Sentiment polarity in `[-1, 1]`, negative for incident-ish language
    pub fn sentiment(features: &IncidentFeatures) -> f64 {
        let negative = features
            .tokens
            .iter()
            .filter(|t| NEGATIVE_TOKENS.contains(t.as_str()))
            .count() as f64;
        let positive = features
            .tokens
            .iter()
            .filter(|t| POSITIVE_TOKENS.contains(t.as_str()))
            .count() as f64;

        let total = negative + positive;
        if total == 0.0 {
            0.0
        } else {
            (positive - negative) / total
        }
    }

    /// The incident's concept set: unique tokens plus extracted entities
    fn concept_set(features: &IncidentFeatures) -> HashSet<String> {
        let mut concepts: HashSet<String> = features.tokens.iter().cloned().collect();
        concepts.extend(features.signals.system_names.iter().cloned());
        if features.signals.has_abend_code {
            concepts.insert("abend".to_string());
        }
        concepts
    }
}

impl Default for NlpAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryScorer for NlpAnalyzer {
    fn method(&self) -> ScoreMethod {
        ScoreMethod::Nlp
    }

    fn score(
        &self,
        _incident: &Incident,
        features: &IncidentFeatures,
        taxonomy: &TaxonomySnapshot,
    ) -> HashMap<String, f64> {
        let concepts = Self::concept_set(features);
        if concepts.is_empty() {
            return HashMap::new();
        }

        let mut scores = HashMap::new();
        for node in taxonomy.nodes() {
            if node.concepts.is_empty() {
                continue;
            }

            let intersection = node.concepts.intersection(&concepts).count();
            if intersection == 0 {
                continue;
            }

            // Overlap coefficient: normalized by the node dictionary alone
            // so verbose incidents are not penalized for off-topic tokens.
            let overlap = intersection as f64 / node.concepts.len() as f64;
            scores.insert(node.id.clone(), overlap.min(1.0));
        }

        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::FeatureExtractor;
    use crate::models::Priority;
    use crate::taxonomy::{test_taxonomy_yaml, TaxonomyStore};

    fn features(text: &str) -> IncidentFeatures {
        FeatureExtractor::new().extract(text, 0)
    }

    fn incident() -> Incident {
        Incident::new("t", "d", Priority::Medium, "manual", 0)
    }

    #[test]
    fn test_sentiment_polarity() {
        assert!(NlpAnalyzer::sentiment(&features("database down, timeout, failed")) < 0.0);
        assert!(NlpAnalyzer::sentiment(&features("service restored and working")) > 0.0);
        assert_eq!(NlpAnalyzer::sentiment(&features("quarterly report")), 0.0);
    }

    #[test]
    fn test_concept_overlap_scores_matching_node() {
        let taxonomy = TaxonomyStore::from_yaml(test_taxonomy_yaml())
            .unwrap()
            .current();
        let analyzer = NlpAnalyzer::new();

        let scores = analyzer.score(
            &incident(),
            &features("deadlock on the database connection pool"),
            &taxonomy,
        );

        // 3 of the node's 4 dictionary concepts present: containment, not
        // a symmetric union over the incident's full token set
        let db = scores.get("infrastructure.database").copied().unwrap_or(0.0);
        assert!((db - 0.75).abs() < 1e-9);
        assert!(!scores.contains_key("general.unclassified"));
    }

    #[test]
    fn test_no_overlap_means_no_entry() {
        let taxonomy = TaxonomyStore::from_yaml(test_taxonomy_yaml())
            .unwrap()
            .current();
        let analyzer = NlpAnalyzer::new();

        let scores = analyzer.score(
            &incident(),
            &features("lunch menu discussion thread"),
            &taxonomy,
        );
        assert!(scores.is_empty());
    }
}
