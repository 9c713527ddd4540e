use crate::config::LearningConfig;
use crate::error::{Result, TriageError};
use crate::learning::{AccuracyMonitor, TriageMetrics};
use crate::metrics::{ACTIVE_MODEL_ACCURACY, FEEDBACK_RECORDS_TOTAL, TRAINING_JOBS_TOTAL};
use crate::ml::classifier::train_candidate;
use crate::ml::{ActiveModel, LabeledSample, ModelSnapshot, ModelStore};
use crate::models::{Algorithm, ClassificationResult, FeedbackRecord, Incident};
use crate::routing::EscalationTracker;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strum::Display;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Why a training job was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TrainReason {
    FeedbackVolume,
    Degradation,
    Interval,
    Forced,
}

/// Outcome of one training job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainOutcome {
    Promoted { version_id: Uuid },
    Rejected { version_id: Uuid, reason: String },
}

/// The continuous learning loop.
///
/// Accumulates labeled samples from classifications and reviewer
/// corrections, watches rolling accuracy, and requests retraining when the
/// trigger conditions fire. Training runs on a single background worker so
/// jobs never overlap; promotion swaps the active model atomically and
/// persists the registry before the swap becomes visible.
pub struct LearningPipeline {
    config: LearningConfig,
    algorithm: Algorithm,
    active: Arc<ActiveModel>,
    store: Arc<dyn ModelStore>,
    escalation: Arc<EscalationTracker>,

    monitor: Mutex<AccuracyMonitor>,
    /// Latest label per incident; corrections overwrite the original
    samples: Mutex<HashMap<Uuid, LabeledSample>>,
    unprocessed_feedback: AtomicUsize,
    last_trained: Mutex<DateTime<Utc>>,

    train_tx: mpsc::Sender<TrainReason>,
}

impl LearningPipeline {
    /// Build the pipeline. The returned receiver must be passed to
    /// [`LearningPipeline::worker_loop`] on a spawned task.
    pub fn new(
        config: LearningConfig,
        active: Arc<ActiveModel>,
        store: Arc<dyn ModelStore>,
        escalation: Arc<EscalationTracker>,
    ) -> (Arc<Self>, mpsc::Receiver<TrainReason>) {
        let algorithm = config.algorithm.parse().unwrap_or_else(|_| {
            tracing::warn!(
                configured = %config.algorithm,
                "Unknown training algorithm, using the default"
            );
            Algorithm::default()
        });

        // Small buffer: a queued request already covers any burst of triggers
        let (train_tx, train_rx) = mpsc::channel(4);

        let monitor = AccuracyMonitor::new(config.accuracy_window, config.degradation_threshold);
        let pipeline = Arc::new(Self {
            config,
            algorithm,
            active,
            store,
            escalation,
            monitor: Mutex::new(monitor),
            samples: Mutex::new(HashMap::new()),
            unprocessed_feedback: AtomicUsize::new(0),
            last_trained: Mutex::new(Utc::now()),
            train_tx,
        });

        (pipeline, train_rx)
    }

    /// Record a served classification as a provisional training sample.
    /// Fallback results carry no label worth learning from.
    pub fn record_classification(&self, incident: &Incident, result: &ClassificationResult) {
        if result.low_confidence_fallback {
            return;
        }
        self.samples.lock().insert(
            incident.id,
            LabeledSample::new(incident.text(), result.chosen_category.clone()),
        );
    }

    /// Accept one reviewer feedback record and evaluate the retrain
    /// triggers.
    pub fn submit_feedback(&self, record: FeedbackRecord) -> Result<()> {
        let confirmation = record.is_confirmation();
        FEEDBACK_RECORDS_TOTAL
            .with_label_values(&[if confirmation { "false" } else { "true" }])
            .inc();

        if !confirmation {
            let mut samples = self.samples.lock();
            match samples.get_mut(&record.incident_id) {
                Some(sample) => sample.category = record.corrected_category.clone(),
                None => {
                    return Err(TriageError::NotFound(format!(
                        "no classification recorded for incident {}",
                        record.incident_id
                    )))
                }
            }
        }

        self.monitor.lock().record(confirmation);
        self.unprocessed_feedback.fetch_add(1, Ordering::Relaxed);

        self.evaluate_triggers(Utc::now());
        Ok(())
    }

    /// Check the three retrain conditions and queue a job when one fires
    pub fn evaluate_triggers(&self, now: DateTime<Utc>) {
        if self.samples.lock().len() < self.config.min_training_samples {
            return;
        }

        let reason = if self.unprocessed_feedback.load(Ordering::Relaxed)
            >= self.config.feedback_retrain_threshold
        {
            Some(TrainReason::FeedbackVolume)
        } else if self.monitor.lock().degraded() {
            Some(TrainReason::Degradation)
        } else {
            let last = *self.last_trained.lock();
            if now - last >= Duration::seconds(self.config.retrain_interval_secs as i64) {
                Some(TrainReason::Interval)
            } else {
                None
            }
        };

        if let Some(reason) = reason {
            self.request_retrain(reason);
        }
    }

    /// Administrative retrain, bypassing the trigger conditions
    pub fn force_retrain(&self) {
        self.request_retrain(TrainReason::Forced);
    }

    fn request_retrain(&self, reason: TrainReason) {
        // A full queue means training is already pending; dropping the
        // request loses nothing.
        match self.train_tx.try_send(reason) {
            Ok(()) => tracing::info!(%reason, "Training job queued"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(%reason, "Training already queued, request coalesced");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!(%reason, "Training worker is gone");
            }
        }
    }

    /// Serialized training worker; runs until the pipeline is dropped
    pub async fn worker_loop(self: Arc<Self>, mut rx: mpsc::Receiver<TrainReason>) {
        while let Some(reason) = rx.recv().await {
            match self.run_training_job(reason).await {
                Ok(TrainOutcome::Promoted { version_id }) => {
                    tracing::info!(%reason, %version_id, "Candidate promoted");
                }
                Ok(TrainOutcome::Rejected { version_id, reason: why }) => {
                    tracing::warn!(%reason, %version_id, rejection = %why, "Candidate rejected");
                }
                Err(e) => {
                    let outcome = match e {
                        TriageError::InsufficientData { .. } => "insufficient_data",
                        _ => "failed",
                    };
                    TRAINING_JOBS_TOTAL.with_label_values(&[outcome]).inc();
                    tracing::error!(%reason, error = %e, "Training job aborted");
                }
            }
        }
    }

    /// Train a candidate, run the promotion gate, and persist the result.
    ///
    /// A registry write failure on the promotion path is propagated as
    /// fatal: promoting a model the store does not know about would lose
    /// the active-version invariant across a restart.
    pub async fn run_training_job(&self, reason: TrainReason) -> Result<TrainOutcome> {
        let samples: Vec<LabeledSample> = self.samples.lock().values().cloned().collect();
        tracing::info!(%reason, samples = samples.len(), algorithm = %self.algorithm, "Training started");

        let trained = train_candidate(
            &samples,
            self.algorithm,
            self.config.validation_split,
            self.config.min_training_samples,
        )?;
        let candidate = trained.version.clone();

        let active_accuracy = self.active.load().version.held_out_accuracy;
        let outcome = match self.promotion_gate(candidate.held_out_accuracy, active_accuracy) {
            Ok(()) => {
                let mut registry = self
                    .store
                    .load()
                    .await?
                    .unwrap_or_default();
                registry.push(candidate.clone());
                registry.activate(candidate.id, samples)?;
                self.store.save(&registry).await?;

                // Swap only after the registry is durably updated
                self.active.promote(ModelSnapshot::from_trained(trained));
                ACTIVE_MODEL_ACCURACY.set(candidate.held_out_accuracy);
                TRAINING_JOBS_TOTAL.with_label_values(&["promoted"]).inc();

                self.monitor.lock().reset();
                TrainOutcome::Promoted {
                    version_id: candidate.id,
                }
            }
            Err(why) => {
                let mut registry = self.store.load().await?.unwrap_or_default();
                let mut rejected = candidate.clone();
                rejected.retire(why.clone());
                registry.push(rejected);
                self.store.save(&registry).await?;

                TRAINING_JOBS_TOTAL.with_label_values(&["rejected"]).inc();
                TrainOutcome::Rejected {
                    version_id: candidate.id,
                    reason: why,
                }
            }
        };

        self.unprocessed_feedback.store(0, Ordering::Relaxed);
        *self.last_trained.lock() = Utc::now();
        Ok(outcome)
    }

    /// The promotion rule: no regression beyond the tolerance, and either
    /// absolute quality or a clear improvement.
    fn promotion_gate(
        &self,
        candidate_accuracy: f64,
        active_accuracy: f64,
    ) -> std::result::Result<(), String> {
        let tolerance = self.config.regression_tolerance;
        let floor = self.config.promotion_floor;

        if candidate_accuracy <= active_accuracy - tolerance {
            return Err(format!(
                "accuracy regression: candidate {:.4} vs active {:.4} exceeds tolerance {:.2}",
                candidate_accuracy, active_accuracy, tolerance
            ));
        }
        if candidate_accuracy < floor && candidate_accuracy - active_accuracy < tolerance {
            return Err(format!(
                "candidate {:.4} is below the {:.2} floor without a {:.2} improvement over active {:.4}",
                candidate_accuracy, floor, tolerance, active_accuracy
            ));
        }
        Ok(())
    }

    /// Operational metrics for the exposed metrics endpoint
    pub fn get_metrics(&self) -> TriageMetrics {
        let active = self.active.load();
        let accuracy = self
            .monitor
            .lock()
            .accuracy()
            .unwrap_or(active.version.held_out_accuracy);

        TriageMetrics {
            accuracy,
            per_category_precision: active.version.per_category_precision.clone(),
            sla_compliance: self.escalation.sla_compliance(),
            escalation_rate: self.escalation.escalation_rate(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn unprocessed_feedback(&self) -> usize {
        self.unprocessed_feedback.load(Ordering::Relaxed)
    }

    /// Seed the sample pool, used at bootstrap and by tests
    pub fn seed_samples(&self, seeded: Vec<(Uuid, LabeledSample)>) {
        self.samples.lock().extend(seeded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingConfig;
    use crate::ml::{InMemoryModelStore, ModelRegistry};
    use crate::models::Priority;
    use crate::notifications::TracingSink;

    fn sample_pool(n: usize) -> Vec<(Uuid, LabeledSample)> {
        (0..n)
            .map(|i| {
                let sample = if i % 2 == 0 {
                    LabeledSample::new(
                        format!("database deadlock timeout connection {}", i),
                        "infrastructure.database",
                    )
                } else {
                    LabeledSample::new(
                        format!("batch job abend scheduler restart {}", i),
                        "application.batch",
                    )
                };
                (Uuid::new_v4(), sample)
            })
            .collect()
    }

    fn active_with_accuracy(accuracy: f64) -> Arc<ActiveModel> {
        let samples: Vec<LabeledSample> =
            sample_pool(60).into_iter().map(|(_, s)| s).collect();
        let mut trained =
            train_candidate(&samples, Algorithm::LogisticRegression, 0.2, 50).unwrap();
        trained.version.held_out_accuracy = accuracy;
        Arc::new(ActiveModel::new(ModelSnapshot::from_trained(trained)))
    }

    fn pipeline_with(
        config: LearningConfig,
        active: Arc<ActiveModel>,
    ) -> (Arc<LearningPipeline>, mpsc::Receiver<TrainReason>) {
        let store = Arc::new(InMemoryModelStore::with_registry(ModelRegistry::default()));
        let escalation = Arc::new(EscalationTracker::new(
            RoutingConfig::default(),
            Arc::new(TracingSink),
        ));
        LearningPipeline::new(config, active, store, escalation)
    }

    fn classified(incident: &Incident, category: &str) -> ClassificationResult {
        ClassificationResult {
            incident_id: incident.id,
            candidates: vec![],
            chosen_category: category.to_string(),
            confidence: 0.9,
            low_confidence_fallback: false,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_promotion_gate_examples() {
        let (pipeline, _rx) = pipeline_with(LearningConfig::default(), active_with_accuracy(0.9));

        // Regression of 0.03 exceeds the 0.02 tolerance
        assert!(pipeline.promotion_gate(0.83, 0.86).is_err());
        // +0.03 improvement over a weaker active model
        assert!(pipeline.promotion_gate(0.87, 0.84).is_ok());
        // Above the floor, no regression
        assert!(pipeline.promotion_gate(0.86, 0.86).is_ok());
        // Below the floor with a clear improvement still qualifies
        assert!(pipeline.promotion_gate(0.84, 0.80).is_ok());
        // Below the floor without improvement does not
        assert!(pipeline.promotion_gate(0.84, 0.835).is_err());
    }

    #[tokio::test]
    async fn test_feedback_correction_relabels_sample() {
        let (pipeline, _rx) = pipeline_with(LearningConfig::default(), active_with_accuracy(0.9));

        let incident = Incident::new(
            "batch abend",
            "S0C7 in payroll",
            Priority::High,
            "monitoring",
            50,
        );
        pipeline.record_classification(&incident, &classified(&incident, "application.batch"));
        assert_eq!(pipeline.sample_count(), 1);

        pipeline
            .submit_feedback(FeedbackRecord::new(
                incident.id,
                "application.batch".to_string(),
                "infrastructure.database".to_string(),
                "reviewer".to_string(),
            ))
            .unwrap();

        let samples = pipeline.samples.lock();
        assert_eq!(
            samples.get(&incident.id).unwrap().category,
            "infrastructure.database"
        );
        assert_eq!(pipeline.unprocessed_feedback(), 1);
    }

    #[tokio::test]
    async fn test_feedback_for_unknown_incident_rejected() {
        let (pipeline, _rx) = pipeline_with(LearningConfig::default(), active_with_accuracy(0.9));

        let err = pipeline
            .submit_feedback(FeedbackRecord::new(
                Uuid::new_v4(),
                "a".to_string(),
                "b".to_string(),
                "reviewer".to_string(),
            ))
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_fallback_results_are_not_samples() {
        let (pipeline, _rx) = pipeline_with(LearningConfig::default(), active_with_accuracy(0.9));

        let incident = Incident::new("noise", "???", Priority::Low, "manual", 1);
        let mut result = classified(&incident, "general.unclassified");
        result.low_confidence_fallback = true;

        pipeline.record_classification(&incident, &result);
        assert_eq!(pipeline.sample_count(), 0);
    }

    #[tokio::test]
    async fn test_feedback_volume_trigger() {
        let mut config = LearningConfig::default();
        config.min_training_samples = 10;
        config.feedback_retrain_threshold = 3;
        let (pipeline, mut rx) = pipeline_with(config, active_with_accuracy(0.9));

        pipeline.seed_samples(sample_pool(10));

        for (id, sample) in sample_pool(3) {
            pipeline.seed_samples(vec![(id, sample.clone())]);
            pipeline
                .submit_feedback(FeedbackRecord::new(
                    id,
                    sample.category.clone(),
                    sample.category.clone(),
                    "reviewer".to_string(),
                ))
                .unwrap();
        }

        assert_eq!(rx.try_recv().unwrap(), TrainReason::FeedbackVolume);
    }

    #[tokio::test]
    async fn test_degradation_trigger() {
        let mut config = LearningConfig::default();
        config.min_training_samples = 10;
        // Volume trigger out of reach so degradation is what fires
        config.feedback_retrain_threshold = 100;
        let (pipeline, mut rx) = pipeline_with(config, active_with_accuracy(0.9));

        let pool = sample_pool(20);
        pipeline.seed_samples(pool.clone());

        // Ten straight corrections: rolling accuracy 0.0 once the monitor
        // has enough observations to speak
        for (id, sample) in pool.into_iter().take(10) {
            let corrected = if sample.category == "infrastructure.database" {
                "application.batch"
            } else {
                "infrastructure.database"
            };
            pipeline
                .submit_feedback(FeedbackRecord::new(
                    id,
                    sample.category.clone(),
                    corrected.to_string(),
                    "reviewer".to_string(),
                ))
                .unwrap();
        }

        assert_eq!(rx.try_recv().unwrap(), TrainReason::Degradation);
    }

    #[tokio::test]
    async fn test_interval_trigger() {
        let mut config = LearningConfig::default();
        config.min_training_samples = 10;
        config.feedback_retrain_threshold = 100;
        let interval = config.retrain_interval_secs as i64;
        let (pipeline, mut rx) = pipeline_with(config, active_with_accuracy(0.9));

        pipeline.seed_samples(sample_pool(10));

        // Inside the interval: nothing queued
        pipeline.evaluate_triggers(Utc::now());
        assert!(rx.try_recv().is_err());

        // Past the interval since the last training run
        pipeline.evaluate_triggers(Utc::now() + Duration::seconds(interval + 1));
        assert_eq!(rx.try_recv().unwrap(), TrainReason::Interval);
    }

    #[tokio::test]
    async fn test_insufficient_samples_blocks_trigger() {
        let mut config = LearningConfig::default();
        config.feedback_retrain_threshold = 1;
        let (pipeline, mut rx) = pipeline_with(config, active_with_accuracy(0.9));

        let (id, sample) = sample_pool(1).remove(0);
        pipeline.seed_samples(vec![(id, sample.clone())]);
        pipeline
            .submit_feedback(FeedbackRecord::new(
                id,
                sample.category.clone(),
                sample.category,
                "reviewer".to_string(),
            ))
            .unwrap();

        // Far below min_training_samples, so nothing queued
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_training_job_promotes_and_persists() {
        let mut config = LearningConfig::default();
        config.min_training_samples = 40;
        let store = Arc::new(InMemoryModelStore::new());
        let escalation = Arc::new(EscalationTracker::new(
            RoutingConfig::default(),
            Arc::new(TracingSink),
        ));
        // Weak active model so the candidate clears the gate
        let active = active_with_accuracy(0.10);
        let (pipeline, _rx) =
            LearningPipeline::new(config, Arc::clone(&active), store.clone(), escalation);

        pipeline.seed_samples(sample_pool(60));

        let outcome = pipeline
            .run_training_job(TrainReason::Forced)
            .await
            .unwrap();
        let TrainOutcome::Promoted { version_id } = outcome else {
            panic!("expected promotion, got {:?}", outcome);
        };

        // Active model swapped and registry persisted with one active version
        assert_eq!(active.load().version.id, version_id);
        let registry = store.load().await.unwrap().unwrap();
        assert_eq!(registry.active_version().unwrap().id, version_id);
        assert_eq!(
            registry.versions.iter().filter(|v| v.is_active()).count(),
            1
        );
        assert!(!registry.active_samples.is_empty());
    }

    #[tokio::test]
    async fn test_training_job_rejects_regression() {
        let mut config = LearningConfig::default();
        config.min_training_samples = 40;
        let store = Arc::new(InMemoryModelStore::new());
        let escalation = Arc::new(EscalationTracker::new(
            RoutingConfig::default(),
            Arc::new(TracingSink),
        ));
        // Active model reports perfect accuracy; any candidate regresses
        let active = active_with_accuracy(1.0);
        let active_id = active.load().version.id;
        let (pipeline, _rx) =
            LearningPipeline::new(config, Arc::clone(&active), store.clone(), escalation);

        // Identical texts with split labels cap achievable accuracy well
        // below the active model's
        let pool: Vec<(Uuid, LabeledSample)> = (0..60)
            .map(|i| {
                let category = if i % 2 == 0 {
                    "infrastructure.database"
                } else {
                    "application.batch"
                };
                (
                    Uuid::new_v4(),
                    LabeledSample::new("identical incident description text", category),
                )
            })
            .collect();
        pipeline.seed_samples(pool);

        let outcome = pipeline
            .run_training_job(TrainReason::Degradation)
            .await
            .unwrap();
        let TrainOutcome::Rejected { version_id, reason } = outcome else {
            panic!("expected rejection, got {:?}", outcome);
        };

        // Active model unchanged; candidate retired with the reason on record
        assert_eq!(active.load().version.id, active_id);
        let registry = store.load().await.unwrap().unwrap();
        let rejected = registry
            .versions
            .iter()
            .find(|v| v.id == version_id)
            .unwrap();
        assert_eq!(rejected.status, crate::models::ModelStatus::Retired);
        assert!(rejected.rejection_reason.as_deref().unwrap().contains("regression"));
        assert!(reason.contains("regression"));
    }

    #[tokio::test]
    async fn test_insufficient_data_aborts_job() {
        let mut config = LearningConfig::default();
        config.min_training_samples = 100;
        let (pipeline, _rx) = pipeline_with(config, active_with_accuracy(0.9));

        pipeline.seed_samples(sample_pool(5));

        let err = pipeline
            .run_training_job(TrainReason::Forced)
            .await
            .unwrap_err();
        assert!(matches!(err, TriageError::InsufficientData { .. }));
    }

    #[test]
    fn test_unknown_algorithm_falls_back_to_default() {
        let mut config = LearningConfig::default();
        config.algorithm = "quantum_forest".to_string();
        let (pipeline, _rx) = pipeline_with(config, active_with_accuracy(0.9));
        assert_eq!(pipeline.algorithm, Algorithm::LogisticRegression);
    }
}
