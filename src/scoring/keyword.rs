use crate::ml::IncidentFeatures;
use crate::models::{Incident, ScoreMethod};
use crate::scoring::CategoryScorer;
use crate::taxonomy::TaxonomySnapshot;
use std::collections::{HashMap, HashSet};

/// Boost applied for urgent priority or automated-monitoring sources.
/// Results stay clamped to 1.0 after boosting.
const CONTEXT_BOOST: f64 = 1.25;

/// Scores each category by the fraction of its curated keyword list found
/// in the incident text.
pub struct KeywordMatcher;

impl KeywordMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryScorer for KeywordMatcher {
    fn method(&self) -> ScoreMethod {
        ScoreMethod::Keyword
    }

    fn score(
        &self,
        incident: &Incident,
        features: &IncidentFeatures,
        taxonomy: &TaxonomySnapshot,
    ) -> HashMap<String, f64> {
        if features.is_empty() {
            return HashMap::new();
        }

        let tokens: HashSet<&str> = features.tokens.iter().map(|t| t.as_str()).collect();
        let boosted = incident.priority.is_urgent() || incident.is_automated();

        let mut scores = HashMap::new();
        for node in taxonomy.nodes() {
            if node.keywords.is_empty() {
                continue;
            }

            let hits = node
                .keywords
                .iter()
                .filter(|k| tokens.contains(k.as_str()))
                .count();
            if hits == 0 {
                continue;
            }

            let mut score = hits as f64 / node.keywords.len() as f64;
            if boosted {
                score *= CONTEXT_BOOST;
            }
            scores.insert(node.id.clone(), score.min(1.0));
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
    use std::sync::Arc;

    fn taxonomy() -> Arc<TaxonomySnapshot> {
        TaxonomyStore::from_yaml(test_taxonomy_yaml())
            .unwrap()
            .current()
    }

    fn score_for(priority: Priority, source: &str, text: &str) -> HashMap<String, f64> {
        let incident = Incident::new("incident", text, priority, source, 10);
        let features = FeatureExtractor::new().extract(&incident.text(), 10);
        KeywordMatcher::new().score(&incident, &features, &taxonomy())
    }

    #[test]
    fn test_fraction_of_keyword_list() {
        // 2 of 4 database keywords present
        let scores = score_for(Priority::Medium, "manual", "database timeout on login");
        let db = scores["infrastructure.database"];
        assert!((db - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_urgent_priority_boost() {
        let plain = score_for(Priority::Medium, "manual", "database timeout on login");
        let urgent = score_for(Priority::Critical, "manual", "database timeout on login");

        let expected = plain["infrastructure.database"] * CONTEXT_BOOST;
        assert!((urgent["infrastructure.database"] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_automated_source_boost_and_clamp() {
        // All 4 keywords hit, boosted, must clamp at 1.0
        let scores = score_for(
            Priority::Low,
            "monitoring",
            "database deadlock after connection timeout",
        );
        assert_eq!(scores["infrastructure.database"], 1.0);
    }

    #[test]
    fn test_no_hits_no_entry() {
        let scores = score_for(Priority::Medium, "manual", "printer out of toner");
        assert!(scores.is_empty());
    }
}
