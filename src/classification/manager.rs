use crate::config::ClassificationConfig;
use crate::metrics::CLASSIFICATIONS_TOTAL;
use crate::ml::{ActiveModel, FeatureExtractor};
use crate::models::{CategoryCandidate, ClassificationResult, Incident, ScoreMethod};
use crate::scoring::{CategoryScorer, KeywordMatcher, MlScorer, NlpAnalyzer, PatternMatcher};
use crate::taxonomy::TaxonomyStore;
use chrono::Utc;
use moka::future::Cache;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Fuses the four scoring strategies into one ranked classification.
///
/// Classification is total: an incident with no usable signal resolves to
/// the fallback category with zero confidence, never an error. Results are
/// cached by content fingerprint so duplicate submissions (retried
/// monitoring alerts) reuse the earlier scoring work.
pub struct CategoryManager {
    config: ClassificationConfig,
    taxonomy: Arc<TaxonomyStore>,
    scorers: Vec<Box<dyn CategoryScorer>>,
    extractor: FeatureExtractor,
    cache: Cache<String, Arc<ClassificationResult>>,
}

impl CategoryManager {
    pub fn new(
        config: ClassificationConfig,
        taxonomy: Arc<TaxonomyStore>,
        active_model: Arc<ActiveModel>,
    ) -> Self {
        let scorers: Vec<Box<dyn CategoryScorer>> = vec![
            Box::new(MlScorer::new(active_model)),
            Box::new(NlpAnalyzer::new()),
            Box::new(KeywordMatcher::new()),
            Box::new(PatternMatcher::new()),
        ];
        Self::with_scorers(config, taxonomy, scorers)
    }

    /// Build with an explicit scorer set
    pub fn with_scorers(
        config: ClassificationConfig,
        taxonomy: Arc<TaxonomyStore>,
        scorers: Vec<Box<dyn CategoryScorer>>,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        Self {
            config,
            taxonomy,
            scorers,
            extractor: FeatureExtractor::new(),
            cache,
        }
    }

    /// Classify one incident. Duplicate content is served from the cache
    /// with the caller's incident id stamped on.
    pub async fn classify(&self, incident: &Incident) -> ClassificationResult {
        let key = incident.fingerprint();

        if let Some(cached) = self.cache.get(&key).await {
            CLASSIFICATIONS_TOTAL.with_label_values(&["cached"]).inc();
            let mut result = (*cached).clone();
            result.incident_id = incident.id;
            return result;
        }

        let result = self.classify_uncached(incident);
        let outcome = if result.low_confidence_fallback {
            "fallback"
        } else {
            "accepted"
        };
        CLASSIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();

        self.cache.insert(key, Arc::new(result.clone())).await;
        result
    }

    fn classify_uncached(&self, incident: &Incident) -> ClassificationResult {
        let taxonomy = self.taxonomy.current();
        let features = self
            .extractor
            .extract(&incident.text(), incident.affected_users);

        // Per-category raw scores, keyed by method
        let mut breakdowns: HashMap<String, HashMap<ScoreMethod, f64>> = HashMap::new();
        for scorer in &self.scorers {
            let method = scorer.method();
            for (category, score) in scorer.score(incident, &features, &taxonomy) {
                breakdowns
                    .entry(category)
                    .or_default()
                    .insert(method, score);
            }
        }

        let mut candidates: Vec<CategoryCandidate> = breakdowns
            .into_iter()
            .map(|(taxonomy_id, method_breakdown)| {
                let weighted: f64 = method_breakdown
                    .iter()
                    .map(|(method, score)| self.weight_for(*method) * score)
                    .sum();

                // Agreement across methods raises confidence; the bonus
                // applies before the clamp so a strong multi-method
                // candidate can saturate at 1.0.
                let bonus =
                    self.config.diversity_bonus * (method_breakdown.len().saturating_sub(1)) as f64;
                let score = (weighted + bonus).min(1.0);

                CategoryCandidate {
                    taxonomy_id,
                    score,
                    method_breakdown,
                }
            })
            .collect();

        candidates.sort_by(|a, b| self.rank(a, b, &taxonomy));
        candidates.truncate(self.config.top_k);

        let (chosen_category, confidence, low_confidence_fallback) = match candidates.first() {
            Some(top) if top.score >= self.config.min_confidence => {
                (top.taxonomy_id.clone(), top.score, false)
            }
            // Sub-threshold confidence is retained on the fallback result
            Some(top) => (self.config.fallback_category.clone(), top.score, true),
            None => (self.config.fallback_category.clone(), 0.0, true),
        };

        tracing::debug!(
            incident_id = %incident.id,
            category = %chosen_category,
            confidence,
            fallback = low_confidence_fallback,
            candidates = candidates.len(),
            "Incident classified"
        );

        ClassificationResult {
            incident_id: incident.id,
            candidates,
            chosen_category,
            confidence,
            low_confidence_fallback,
            timestamp: Utc::now(),
        }
    }

    fn weight_for(&self, method: ScoreMethod) -> f64 {
        match method {
            ScoreMethod::Ml => self.config.ml_weight,
            ScoreMethod::Nlp => self.config.nlp_weight,
            ScoreMethod::Keyword => self.config.keyword_weight,
            ScoreMethod::Pattern => self.config.pattern_weight,
        }
    }

    /// Descending fused score, then raw ML probability, then taxonomy
    /// priority weight, then ascending id for a stable total order.
    fn rank(
        &self,
        a: &CategoryCandidate,
        b: &CategoryCandidate,
        taxonomy: &crate::taxonomy::TaxonomySnapshot,
    ) -> Ordering {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                let ml_a = a.method_breakdown.get(&ScoreMethod::Ml).copied().unwrap_or(0.0);
                let ml_b = b.method_breakdown.get(&ScoreMethod::Ml).copied().unwrap_or(0.0);
                ml_b.partial_cmp(&ml_a).unwrap_or(Ordering::Equal)
            })
            .then_with(|| {
                let w = |c: &CategoryCandidate| {
                    taxonomy.node(&c.taxonomy_id).map_or(0.0, |n| n.priority_weight)
                };
                w(b).partial_cmp(&w(a)).unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.taxonomy_id.cmp(&b.taxonomy_id))
    }
}
