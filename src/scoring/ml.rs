use crate::ml::{ActiveModel, IncidentFeatures};
use crate::models::{Incident, ScoreMethod};
use crate::scoring::CategoryScorer;
use crate::taxonomy::TaxonomySnapshot;
use std::collections::HashMap;
use std::sync::Arc;

/// Scores categories with the currently active trained model.
///
/// The scorer binds to one model snapshot per call, so a promotion landing
/// mid-classification never mixes two models' outputs.
pub struct MlScorer {
    active: Arc<ActiveModel>,
}

impl MlScorer {
    pub fn new(active: Arc<ActiveModel>) -> Self {
        Self { active }
    }
}

impl CategoryScorer for MlScorer {
    fn method(&self) -> ScoreMethod {
        ScoreMethod::Ml
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

        let snapshot = self.active.load();
        let mut scores = snapshot.predict(&incident.text());

        // The model may predict labels that a taxonomy reload has since
        // removed; those carry no routable signal.
        scores.retain(|category, _| taxonomy.node(category).is_some());
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::train_candidate;
    use crate::ml::{LabeledSample, ModelSnapshot};
    use crate::models::{Algorithm, Priority};
    use crate::taxonomy::{test_taxonomy_yaml, TaxonomyStore};

    fn scorer() -> MlScorer {
        let samples: Vec<LabeledSample> = (0..60)
            .map(|i| {
                if i % 2 == 0 {
                    LabeledSample::new(
                        format!("database deadlock timeout {}", i),
                        "infrastructure.database",
                    )
                } else {
                    LabeledSample::new(format!("batch abend restart {}", i), "application.batch")
                }
            })
            .collect();
        let trained = train_candidate(&samples, Algorithm::LogisticRegression, 0.2, 50).unwrap();
        MlScorer::new(Arc::new(ActiveModel::new(ModelSnapshot::from_trained(
            trained,
        ))))
    }

    fn incident(description: &str) -> Incident {
        Incident::new(
            "test incident",
            description,
            Priority::Medium,
            "manual",
            10,
        )
    }

    #[test]
    fn test_scores_trained_category() {
        let scorer = scorer();
        let taxonomy = TaxonomyStore::from_yaml(test_taxonomy_yaml())
            .unwrap()
            .current();
        let incident = incident("database deadlock on primary");
        let features = crate::ml::FeatureExtractor::new().extract(&incident.text(), 10);

        let scores = scorer.score(&incident, &features, &taxonomy);
        assert_eq!(scores.get("infrastructure.database"), Some(&1.0));
    }

    #[test]
    fn test_empty_features_yield_no_signal() {
        let scorer = scorer();
        let taxonomy = TaxonomyStore::from_yaml(test_taxonomy_yaml())
            .unwrap()
            .current();
        let incident = incident("");
        let features = IncidentFeatures::default();

        assert!(scorer.score(&incident, &features, &taxonomy).is_empty());
    }
}
