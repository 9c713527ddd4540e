//! Prometheus metrics for the triage engine.
//!
//! A single global registry collects counters for the classification,
//! routing and learning paths. Recording is lock-free atomic increments;
//! exposition renders the standard text format for `GET /metrics`.

use crate::error::{Result, TriageError};
use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Classification outcomes
    ///
    /// Labels: outcome = accepted | fallback | cached
    pub static ref CLASSIFICATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("classifications_total", "Total classification requests")
            .namespace("incident_triage"),
        &["outcome"]
    ).expect("Failed to create CLASSIFICATIONS_TOTAL metric");

    /// Routing decisions
    ///
    /// Labels: overflowed = true | false
    pub static ref ROUTING_DECISIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("routing_decisions_total", "Total routing decisions")
            .namespace("incident_triage"),
        &["overflowed"]
    ).expect("Failed to create ROUTING_DECISIONS_TOTAL metric");

    /// Escalation transitions
    ///
    /// Labels: level = escalated_l1 | escalated_l2 | escalated_l3 | resolved
    pub static ref ESCALATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("escalations_total", "Total escalation transitions")
            .namespace("incident_triage"),
        &["level"]
    ).expect("Failed to create ESCALATIONS_TOTAL metric");

    /// Training job outcomes
    ///
    /// Labels: outcome = promoted | rejected | insufficient_data | failed
    pub static ref TRAINING_JOBS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("training_jobs_total", "Total training jobs")
            .namespace("incident_triage"),
        &["outcome"]
    ).expect("Failed to create TRAINING_JOBS_TOTAL metric");

    /// Feedback records received
    pub static ref FEEDBACK_RECORDS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("feedback_records_total", "Total feedback submissions")
            .namespace("incident_triage"),
        &["corrected"]
    ).expect("Failed to create FEEDBACK_RECORDS_TOTAL metric");

    /// Held-out accuracy of the currently active model
    pub static ref ACTIVE_MODEL_ACCURACY: Gauge = Gauge::with_opts(
        Opts::new("active_model_accuracy", "Held-out accuracy of the active model")
            .namespace("incident_triage")
    ).expect("Failed to create ACTIVE_MODEL_ACCURACY metric");
}

/// Register all metrics with the global registry. Idempotent in practice:
/// a second call returns an error from prometheus which is reported once.
pub fn init_metrics() -> Result<()> {
    PROMETHEUS_REGISTRY
        .register(Box::new(CLASSIFICATIONS_TOTAL.clone()))
        .map_err(|e| TriageError::Internal(format!("metric registration failed: {}", e)))?;
    PROMETHEUS_REGISTRY
        .register(Box::new(ROUTING_DECISIONS_TOTAL.clone()))
        .map_err(|e| TriageError::Internal(format!("metric registration failed: {}", e)))?;
    PROMETHEUS_REGISTRY
        .register(Box::new(ESCALATIONS_TOTAL.clone()))
        .map_err(|e| TriageError::Internal(format!("metric registration failed: {}", e)))?;
    PROMETHEUS_REGISTRY
        .register(Box::new(TRAINING_JOBS_TOTAL.clone()))
        .map_err(|e| TriageError::Internal(format!("metric registration failed: {}", e)))?;
    PROMETHEUS_REGISTRY
        .register(Box::new(FEEDBACK_RECORDS_TOTAL.clone()))
        .map_err(|e| TriageError::Internal(format!("metric registration failed: {}", e)))?;
    PROMETHEUS_REGISTRY
        .register(Box::new(ACTIVE_MODEL_ACCURACY.clone()))
        .map_err(|e| TriageError::Internal(format!("metric registration failed: {}", e)))?;

    Ok(())
}

/// Render the registry in Prometheus text exposition format
pub fn gather() -> Result<String> {
    let encoder = TextEncoder::new();
    let families = PROMETHEUS_REGISTRY.gather();
    let mut buf = Vec::new();
    encoder
        .encode(&families, &mut buf)
        .map_err(|e| TriageError::Internal(format!("metric encoding failed: {}", e)))?;
    String::from_utf8(buf).map_err(|e| TriageError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_record() {
        CLASSIFICATIONS_TOTAL.with_label_values(&["accepted"]).inc();
        CLASSIFICATIONS_TOTAL.with_label_values(&["fallback"]).inc();
        ROUTING_DECISIONS_TOTAL.with_label_values(&["false"]).inc();

        assert!(CLASSIFICATIONS_TOTAL.with_label_values(&["accepted"]).get() >= 1.0);
        assert!(ROUTING_DECISIONS_TOTAL.with_label_values(&["false"]).get() >= 1.0);
    }

    #[test]
    fn test_gather_renders_text() {
        let _ = init_metrics();
        CLASSIFICATIONS_TOTAL.with_label_values(&["accepted"]).inc();
        let text = gather().unwrap();
        assert!(text.contains("incident_triage_classifications_total"));
    }
}
