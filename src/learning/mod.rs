//! Continuous learning: accuracy monitoring, retrain triggers, training and
//! the promotion gate.

mod monitor;
mod pipeline;

pub use monitor::AccuracyMonitor;
pub use pipeline::{LearningPipeline, TrainOutcome, TrainReason};

use serde::Serialize;
use std::collections::HashMap;

/// Operational metrics exposed by `GET /v1/metrics`
#[derive(Debug, Clone, Serialize)]
pub struct TriageMetrics {
    /// Rolling feedback accuracy; the active model's held-out accuracy
    /// until enough feedback has arrived
    pub accuracy: f64,

    /// Per-category precision of the active model
    pub per_category_precision: HashMap<String, f64>,

    /// Fraction of resolved incidents closed within their SLA
    pub sla_compliance: f64,

    /// Fraction of routed incidents that escalated at least once
    pub escalation_rate: f64,
}
