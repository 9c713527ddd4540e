pub mod classifier;
pub mod features;
pub mod snapshot;
pub mod store;

pub use classifier::{train_candidate, Classifier, TrainedModel};
pub use features::{FeatureExtractor, IncidentFeatures, TechnicalSignals};
pub use snapshot::{ActiveModel, ModelSnapshot};
pub use store::{FileModelStore, InMemoryModelStore, ModelRegistry, ModelStore};

use serde::{Deserialize, Serialize};

/// One labeled training example: incident text plus its reviewed category.
///
/// Samples accumulate from classified incidents and reviewer corrections and
/// are what the model store persists, since trained smartcore models are
/// refit from them at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledSample {
    pub text: String,
    pub category: String,
}

impl LabeledSample {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
        }
    }
}
