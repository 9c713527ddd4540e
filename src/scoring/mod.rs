//! The four category scoring strategies.
//!
//! Each scorer maps one incident to per-category scores in `[0, 1]`. The
//! scorers are independent: a category absent from a scorer's map
//! contributed no signal from that method, which is distinct from an
//! explicit `0.0`. Fusion happens downstream in the classification manager.

pub mod keyword;
pub mod ml;
pub mod nlp;
pub mod pattern;

pub use keyword::KeywordMatcher;
pub use ml::MlScorer;
pub use nlp::NlpAnalyzer;
pub use pattern::PatternMatcher;

use crate::ml::IncidentFeatures;
use crate::models::{Incident, ScoreMethod};
use crate::taxonomy::TaxonomySnapshot;
use std::collections::HashMap;

/// One scoring strategy. Implementations are infallible: no usable signal
/// means an empty map, never an error.
pub trait CategoryScorer: Send + Sync {
    fn method(&self) -> ScoreMethod;

    /// Per-category scores for this incident, each in `[0, 1]`
    fn score(
        &self,
        incident: &Incident,
        features: &IncidentFeatures,
        taxonomy: &TaxonomySnapshot,
    ) -> HashMap<String, f64>;
}
