use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};
use uuid::Uuid;

/// Training algorithm selection.
///
/// smartcore's SVC is binary-only, so logistic regression serves as the
/// linear-margin option; the decision tree covers the forest family.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Algorithm {
    NaiveBayes,
    #[default]
    LogisticRegression,
    DecisionTree,
}

/// Lifecycle status of a trained model version.
///
/// Invariant: exactly one version is `Active` at any observable instant.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelStatus {
    Candidate,
    Active,
    Retired,
}

/// Metadata record for one trained model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Unique identifier
    pub id: Uuid,

    /// Algorithm used for training
    pub algorithm: Algorithm,

    /// Training timestamp
    pub trained_at: DateTime<Utc>,

    /// Accuracy on the held-out validation split
    pub held_out_accuracy: f64,

    /// Precision per taxonomy category on the validation split
    pub per_category_precision: HashMap<String, f64>,

    /// Lifecycle status
    pub status: ModelStatus,

    /// Why a candidate was retired without promotion, when applicable
    pub rejection_reason: Option<String>,

    /// Number of samples the model was trained on
    pub n_training_samples: usize,
}

impl ModelVersion {
    /// Create a fresh candidate version
    pub fn candidate(
        algorithm: Algorithm,
        held_out_accuracy: f64,
        per_category_precision: HashMap<String, f64>,
        n_training_samples: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            algorithm,
            trained_at: Utc::now(),
            held_out_accuracy,
            per_category_precision,
            status: ModelStatus::Candidate,
            rejection_reason: None,
            n_training_samples,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ModelStatus::Active
    }

    /// Mark as retired with a recorded reason
    pub fn retire(&mut self, reason: impl Into<String>) {
        self.status = ModelStatus::Retired;
        self.rejection_reason = Some(reason.into());
    }
}
