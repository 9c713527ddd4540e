use crate::ml::classifier::{Classifier, TrainedModel};
use crate::ml::features::FeatureExtractor;
use crate::models::ModelVersion;
use ndarray::Array2;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// An immutable, fully trained model bound to its fitted extractor and
/// label list. Classification calls bind to exactly one snapshot for their
/// whole duration.
pub struct ModelSnapshot {
    pub version: ModelVersion,
    extractor: FeatureExtractor,
    model: Box<dyn Classifier>,
    labels: Vec<String>,
}

impl std::fmt::Debug for ModelSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSnapshot")
            .field("version", &self.version)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl ModelSnapshot {
    pub fn from_trained(trained: TrainedModel) -> Self {
        Self {
            version: trained.version,
            extractor: trained.extractor,
            model: trained.model,
            labels: trained.labels,
        }
    }

    /// Probability map over taxonomy categories for one incident text.
    ///
    /// smartcore exposes hard predictions, so the map is one-hot on the
    /// predicted label; an unpredictable input (empty vector, model error)
    /// yields an empty map rather than an error.
    pub fn predict(&self, text: &str) -> HashMap<String, f64> {
        let vector = self.extractor.transform_vec(text);
        if vector.is_empty() || vector.iter().all(|&v| v == 0.0) {
            return HashMap::new();
        }

        let n = vector.len();
        let features = match Array2::from_shape_vec((1, n), vector) {
            Ok(f) => f,
            Err(_) => return HashMap::new(),
        };

        match self.model.predict(&features) {
            Ok(predictions) => {
                let mut scores = HashMap::new();
                if let Some(label) = predictions.first().and_then(|&i| self.labels.get(i)) {
                    scores.insert(label.clone(), 1.0);
                }
                scores
            }
            Err(e) => {
                tracing::warn!(error = %e, "ML prediction failed, treating as no signal");
                HashMap::new()
            }
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// The single mutable cell holding the currently active model.
///
/// Readers clone the Arc once per call (one immutable snapshot per
/// classification); promotion swaps the Arc under a short write lock, so
/// traffic never observes zero or two active models.
pub struct ActiveModel {
    inner: RwLock<Arc<ModelSnapshot>>,
}

impl ActiveModel {
    pub fn new(snapshot: ModelSnapshot) -> Self {
        Self {
            inner: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Bind to the current snapshot
    pub fn load(&self) -> Arc<ModelSnapshot> {
        Arc::clone(&self.inner.read())
    }

    /// Atomically replace the active snapshot, returning the previous one
    pub fn promote(&self, snapshot: ModelSnapshot) -> Arc<ModelSnapshot> {
        let mut guard = self.inner.write();
        std::mem::replace(&mut *guard, Arc::new(snapshot))
    }
}
