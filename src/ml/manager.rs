//! Anomaly model lifecycle
//!
//! Loads the persisted forest if one exists, otherwise fits a fresh one on the
//! bootstrap sample and writes it out. The resulting handle is held for the
//! life of the process and shared read-only.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use super::features::{FeatureVector, NUM_FEATURES, TX_FEATURE_SCHEMA};
use super::models::{AnomalyModel, IsolationForest, Prediction};
use super::storage::ModelArtifact;
use crate::config::ModelConfig;
use crate::error::{Result, ScorerError};

/// Hand-picked "ordinary" transactions used to fit a model when no artifact
/// exists. A placeholder until the forest is fit on real history.
pub const BOOTSTRAP_SAMPLE: [[f64; NUM_FEATURES]; 3] = [
    [2.0, 2.0, 100.0, 100.0, 1.0, 0.01, 0.95, 1.0],
    [1.0, 1.0, 50.0, 50.0, 0.5, 0.01, 1.0, 1.0],
    [3.0, 3.0, 200.0, 200.0, 2.0, 0.01, 0.9, 1.0],
];

pub fn bootstrap_sample() -> Vec<FeatureVector> {
    BOOTSTRAP_SAMPLE.iter().copied().map(FeatureVector::new).collect()
}

/// Owns the process-wide anomaly model handle
pub struct ModelManager {
    config: ModelConfig,
    model: OnceLock<Arc<dyn AnomalyModel>>,
}

impl ModelManager {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            model: OnceLock::new(),
        }
    }

    /// Manager with an already-built model, bypassing storage
    pub fn with_model(config: ModelConfig, model: Arc<dyn AnomalyModel>) -> Self {
        let manager = Self::new(config);
        let _ = manager.model.set(model);
        manager
    }

    pub fn model_path(&self) -> &Path {
        &self.config.path
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Current model handle, if loaded
    pub fn model(&self) -> Option<Arc<dyn AnomalyModel>> {
        self.model.get().cloned()
    }

    /// Load or create the model. Idempotent: once a handle is held, storage is
    /// not touched again.
    pub fn ensure_loaded(&self) -> Result<Arc<dyn AnomalyModel>> {
        if let Some(model) = self.model.get() {
            return Ok(model.clone());
        }

        let model = if self.config.path.exists() {
            self.load()?
        } else {
            self.create()
        };

        Ok(self.model.get_or_init(|| model).clone())
    }

    /// Run one inference pass against the held model
    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        let model = self.model.get().ok_or(ScorerError::ModelNotLoaded)?;
        Ok(model.predict(features))
    }

    fn load(&self) -> Result<Arc<dyn AnomalyModel>> {
        let path = &self.config.path;
        info!("Loading model from {}", path.display());

        let load_error = |reason: String| ScorerError::ModelLoad {
            path: path.clone(),
            reason,
        };

        let artifact = ModelArtifact::load(path).map_err(|e| load_error(format!("{:#}", e)))?;

        if !artifact.matches_schema(&TX_FEATURE_SCHEMA) {
            return Err(load_error(format!(
                "feature schema mismatch: artifact v{} {:?}, expected v{} {:?}",
                artifact.schema_version,
                artifact.feature_names,
                TX_FEATURE_SCHEMA.version,
                TX_FEATURE_SCHEMA.names
            )));
        }
        if !artifact.forest.is_trained() {
            return Err(load_error("artifact contains an untrained model".into()));
        }

        info!(
            "Loaded {} with {} trees (created {})",
            artifact.forest.name(),
            artifact.forest.num_trees(),
            artifact.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        Ok(Arc::new(artifact.forest))
    }

    fn create(&self) -> Arc<dyn AnomalyModel> {
        let params = self.config.forest_params();
        info!(
            "Creating new IsolationForest (contamination={}, n_estimators={}, seed={})",
            params.contamination, params.n_estimators, params.seed
        );

        let mut forest = IsolationForest::new(params);
        forest.fit(&bootstrap_sample());

        let artifact = ModelArtifact::new(forest);
        match artifact.save(&self.config.path) {
            Ok(()) => info!("Model saved to {}", self.config.path.display()),
            Err(e) => {
                let err = ScorerError::ModelPersist {
                    path: self.config.path.clone(),
                    reason: format!("{:#}", e),
                };
                warn!("{}; serving in-memory model for this process only", err);
            }
        }

        Arc::new(artifact.forest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_at(path: &Path) -> ModelConfig {
        ModelConfig {
            path: path.to_path_buf(),
            ..ModelConfig::default()
        }
    }

    fn sample_tx() -> FeatureVector {
        FeatureVector::new([2.0, 2.0, 100.0, 99.0, 1.0, 0.01, 0.99, 1.0])
    }

    #[test]
    fn test_cold_start_creates_and_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("models").join("tx_anomaly_model.bin");
        let manager = ModelManager::new(config_at(&path));

        assert!(!manager.is_loaded());
        assert!(matches!(
            manager.predict(&sample_tx()),
            Err(ScorerError::ModelNotLoaded)
        ));

        let model = manager.ensure_loaded().unwrap();
        assert!(manager.is_loaded());
        assert!(model.is_trained());
        assert!(path.exists());
    }

    #[test]
    fn test_warm_start_reproduces_predictions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.bin");

        let first = ModelManager::new(config_at(&path));
        first.ensure_loaded().unwrap();
        let before = first.predict(&sample_tx()).unwrap();

        let second = ModelManager::new(config_at(&path));
        second.ensure_loaded().unwrap();
        assert_eq!(second.predict(&sample_tx()).unwrap(), before);
    }

    #[test]
    fn test_fresh_models_are_deterministic() {
        let temp = TempDir::new().unwrap();
        let a = ModelManager::new(config_at(&temp.path().join("a.bin")));
        let b = ModelManager::new(config_at(&temp.path().join("b.bin")));
        a.ensure_loaded().unwrap();
        b.ensure_loaded().unwrap();

        assert_eq!(a.predict(&sample_tx()).unwrap(), b.predict(&sample_tx()).unwrap());
    }

    #[test]
    fn test_ensure_loaded_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.bin");
        let manager = ModelManager::new(config_at(&path));

        let first = manager.ensure_loaded().unwrap();
        fs::remove_file(&path).unwrap();
        let second = manager.ensure_loaded().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_artifact_is_not_replaced() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.bin");
        fs::write(&path, b"garbage").unwrap();

        let manager = ModelManager::new(config_at(&path));
        let err = manager.ensure_loaded().err().expect("load must fail");

        assert!(matches!(err, ScorerError::ModelLoad { .. }));
        assert!(!manager.is_loaded());
        assert_eq!(fs::read(&path).unwrap(), b"garbage");
    }

    #[test]
    fn test_oversized_length_prefix_is_load_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.bin");

        // schema_version=1, one feature name whose length claims 16 TiB
        let mut bytes = vec![1u8, 1, 253];
        bytes.extend_from_slice(&(1u64 << 44).to_le_bytes());
        bytes.extend_from_slice(b"abc");
        fs::write(&path, &bytes).unwrap();

        let manager = ModelManager::new(config_at(&path));
        let err = manager.ensure_loaded().err().expect("load must fail");

        assert!(matches!(err, ScorerError::ModelLoad { .. }));
        assert!(!manager.is_loaded());
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn test_schema_mismatch_fails_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.bin");

        let mut forest = IsolationForest::new(ModelConfig::default().forest_params());
        forest.fit(&bootstrap_sample());
        let mut artifact = ModelArtifact::new(forest);
        artifact.feature_names.swap(4, 5);
        artifact.save(&path).unwrap();

        let err = ModelManager::new(config_at(&path))
            .ensure_loaded()
            .err()
            .expect("load must fail");
        match err {
            ScorerError::ModelLoad { reason, .. } => assert!(reason.contains("schema")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unwritable_path_keeps_in_memory_model() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("not_a_dir");
        fs::write(&blocker, b"").unwrap();
        let path = blocker.join("model.bin");

        let manager = ModelManager::new(config_at(&path));
        let model = manager.ensure_loaded().unwrap();

        assert!(model.is_trained());
        assert!(manager.predict(&sample_tx()).is_ok());
        assert!(!path.exists());
    }

    #[test]
    fn test_bootstrap_sample_scores_as_normal() {
        let mut forest = IsolationForest::new(ModelConfig::default().forest_params());
        let sample = bootstrap_sample();
        forest.fit(&sample);

        // The median row sits above the contamination threshold
        let prediction = forest.predict(&sample[0]);
        assert!(prediction.decision_score >= 0.0);
        assert!(!prediction.label.is_outlier());
    }
}
