use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};
use uuid::Uuid;

/// The scoring method that produced a per-category score
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScoreMethod {
    Ml,
    Nlp,
    Keyword,
    Pattern,
}

/// One ranked category candidate with its fused score and the per-method
/// contributions that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCandidate {
    /// Taxonomy node id
    pub taxonomy_id: String,

    /// Fused score in [0, 1]
    pub score: f64,

    /// Raw per-method scores before weighting
    pub method_breakdown: HashMap<ScoreMethod, f64>,
}

/// The outcome of classifying one incident against one model snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Incident this result belongs to
    pub incident_id: Uuid,

    /// Candidates sorted descending by score; every score in [0, 1]
    pub candidates: Vec<CategoryCandidate>,

    /// Chosen category: the top candidate, or the fallback when confidence
    /// is below threshold
    pub chosen_category: String,

    /// Confidence of the chosen category (the top combined score, retained
    /// even when it falls below the acceptance threshold)
    pub confidence: f64,

    /// True when the fallback category was substituted
    pub low_confidence_fallback: bool,

    /// When the classification was produced
    pub timestamp: DateTime<Utc>,
}

impl ClassificationResult {
    /// Top candidate, if any survived scoring
    pub fn top_candidate(&self) -> Option<&CategoryCandidate> {
        self.candidates.first()
    }

    /// Check the ordering and bounds invariants
    pub fn invariants_hold(&self) -> bool {
        let sorted = self
            .candidates
            .windows(2)
            .all(|w| w[0].score >= w[1].score);
        let bounded = self
            .candidates
            .iter()
            .all(|c| (0.0..=1.0).contains(&c.score));
        sorted && bounded && (0.0..=1.0).contains(&self.confidence)
    }
}
