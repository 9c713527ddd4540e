use crate::ml::IncidentFeatures;
use crate::models::{Incident, ScoreMethod};
use crate::scoring::CategoryScorer;
use crate::taxonomy::TaxonomySnapshot;
use std::collections::HashMap;

/// Binary regex scorer for structured tokens (abend codes, SQL/ORA error
/// codes, job-id formats). A category scores 1.0 when any of its patterns
/// matches the raw text, and contributes nothing otherwise.
pub struct PatternMatcher;

impl PatternMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryScorer for PatternMatcher {
    fn method(&self) -> ScoreMethod {
        ScoreMethod::Pattern
    }

    fn score(
        &self,
        incident: &Incident,
        _features: &IncidentFeatures,
        taxonomy: &TaxonomySnapshot,
    ) -> HashMap<String, f64> {
        // Patterns run over the raw text: tokenization strips the
        // punctuation that codes like ORA-00600 depend on.
        let text = incident.text();
        if text.trim().is_empty() {
            return HashMap::new();
        }

        let mut scores = HashMap::new();
        for node in taxonomy.nodes() {
            if node.patterns.iter().any(|p| p.is_match(&text)) {
                scores.insert(node.id.clone(), 1.0);
            }
        }

        scores
    }
}
