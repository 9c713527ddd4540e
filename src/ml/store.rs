use crate::error::{Result, TriageError};
use crate::ml::classifier::train_candidate;
use crate::ml::snapshot::ModelSnapshot;
use crate::ml::LabeledSample;
use crate::models::{ModelStatus, ModelVersion};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The persisted model state: every version record plus the labeled samples
/// the active model was trained on.
///
/// smartcore models are not serde-serializable, so the artifact for a model
/// is its training set; the active model is refit deterministically from it
/// at load time (same data, same split, same algorithm).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRegistry {
    pub versions: Vec<ModelVersion>,
    pub active_samples: Vec<LabeledSample>,
}

impl ModelRegistry {
    pub fn active_version(&self) -> Option<&ModelVersion> {
        self.versions.iter().find(|v| v.is_active())
    }

    /// Record a candidate version
    pub fn push(&mut self, version: ModelVersion) {
        self.versions.push(version);
    }

    /// Make `id` the single active version, retiring the previous one.
    /// The registry never holds zero or two active versions afterwards.
    pub fn activate(&mut self, id: Uuid, samples: Vec<LabeledSample>) -> Result<()> {
        if !self.versions.iter().any(|v| v.id == id) {
            return Err(TriageError::NotFound(format!("model version {}", id)));
        }

        for version in &mut self.versions {
            if version.id == id {
                version.status = ModelStatus::Active;
            } else if version.status == ModelStatus::Active {
                version.status = ModelStatus::Retired;
                version.rejection_reason = None;
            }
        }

        self.active_samples = samples;
        Ok(())
    }

    /// Retire a candidate with a recorded reason
    pub fn retire(&mut self, id: Uuid, reason: &str) {
        if let Some(version) = self.versions.iter_mut().find(|v| v.id == id) {
            version.retire(reason);
        }
    }

    /// Refit the active model from its persisted samples, keeping the
    /// persisted version record (id, metrics, timestamps).
    pub fn refit_active(&self, validation_split: f64) -> Result<ModelSnapshot> {
        let active = self
            .active_version()
            .ok_or_else(|| TriageError::ModelLoad("registry has no active version".to_string()))?
            .clone();

        if self.active_samples.is_empty() {
            return Err(TriageError::ModelLoad(format!(
                "active version {} has no persisted training samples",
                active.id
            )));
        }

        let mut trained = train_candidate(
            &self.active_samples,
            active.algorithm,
            validation_split,
            1, // the persisted set already passed the minimum at training time
        )
        .map_err(|e| TriageError::ModelLoad(format!("refit failed: {}", e)))?;

        trained.version = active;
        Ok(ModelSnapshot::from_trained(trained))
    }
}

/// Persistence seam for model versions and artifacts
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Load the registry; `None` when no registry has ever been written
    async fn load(&self) -> Result<Option<ModelRegistry>>;

    /// Persist the registry. Failures here are treated as fatal by callers
    /// on the promotion path.
    async fn save(&self, registry: &ModelRegistry) -> Result<()>;
}

/// File-backed store keeping a single JSON registry document
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join("registry.json"),
        }
    }
}

#[async_trait]
impl ModelStore for FileModelStore {
    async fn load(&self) -> Result<Option<ModelRegistry>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let registry: ModelRegistry = serde_json::from_str(&raw)
                    .map_err(|e| TriageError::ModelLoad(format!("corrupt registry: {}", e)))?;
                Ok(Some(registry))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TriageError::ModelLoad(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, registry: &ModelRegistry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let raw = serde_json::to_string_pretty(registry)?;

        // Write-then-rename keeps the registry readable if we crash mid-save
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), versions = registry.versions.len(), "Model registry saved");
        Ok(())
    }
}

/// In-memory store for tests
#[derive(Default)]
pub struct InMemoryModelStore {
    registry: RwLock<Option<ModelRegistry>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with a registry (startup fixtures)
    pub fn with_registry(registry: ModelRegistry) -> Self {
        Self {
            registry: RwLock::new(Some(registry)),
        }
    }
}

#[async_trait]
impl ModelStore for InMemoryModelStore {
    async fn load(&self) -> Result<Option<ModelRegistry>> {
        Ok(self.registry.read().clone())
    }

    async fn save(&self, registry: &ModelRegistry) -> Result<()> {
        *self.registry.write() = Some(registry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Algorithm;
    use std::collections::HashMap;

    fn sample_set() -> Vec<LabeledSample> {
        (0..60)
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
            .collect()
    }

    fn registry_with_active() -> ModelRegistry {
        let mut registry = ModelRegistry::default();
        let version =
            ModelVersion::candidate(Algorithm::NaiveBayes, 0.9, HashMap::new(), 60);
        let id = version.id;
        registry.push(version);
        registry.activate(id, sample_set()).unwrap();
        registry
    }

    #[test]
    fn test_activate_maintains_single_active() {
        let mut registry = registry_with_active();
        let first_active = registry.active_version().unwrap().id;

        let candidate =
            ModelVersion::candidate(Algorithm::LogisticRegression, 0.95, HashMap::new(), 80);
        let candidate_id = candidate.id;
        registry.push(candidate);
        registry.activate(candidate_id, sample_set()).unwrap();

        let actives: Vec<_> = registry.versions.iter().filter(|v| v.is_active()).collect();
        assert_eq!(actives.len(), 1);
        assert_eq!(actives[0].id, candidate_id);

        let retired = registry
            .versions
            .iter()
            .find(|v| v.id == first_active)
            .unwrap();
        assert_eq!(retired.status, ModelStatus::Retired);
    }

    #[test]
    fn test_refit_active_preserves_version_record() {
        let registry = registry_with_active();
        let active_id = registry.active_version().unwrap().id;

        let snapshot = registry.refit_active(0.2).unwrap();
        assert_eq!(snapshot.version.id, active_id);
        assert_eq!(snapshot.version.held_out_accuracy, 0.9);
        assert!(!snapshot.predict("database deadlock").is_empty());
    }

    #[test]
    fn test_refit_without_active_is_model_load_error() {
        let registry = ModelRegistry::default();
        let err = registry.refit_active(0.2).unwrap_err();
        assert_eq!(err.error_code(), "MODEL_LOAD_ERROR");
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path());

        assert!(store.load().await.unwrap().is_none());

        let registry = registry_with_active();
        store.save(&registry).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.versions.len(), 1);
        assert_eq!(loaded.active_samples.len(), 60);
        assert!(loaded.active_version().is_some());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_registry_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("registry.json"), "{not json")
            .await
            .unwrap();

        let store = FileModelStore::new(dir.path());
        let err = store.load().await.unwrap_err();
        assert_eq!(err.error_code(), "MODEL_LOAD_ERROR");
    }
}
