//! Anomaly models
//!
//! The scoring service only talks to [`AnomalyModel`], so any implementation
//! (including test doubles) can be injected behind an `Arc<dyn AnomalyModel>`.

pub mod isolation_forest;

pub use isolation_forest::IsolationForest;

use serde::{Deserialize, Serialize};

use super::features::FeatureVector;

/// Discrete model verdict under the model's own decision boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    /// Conventionally reported as `-1`
    Outlier,
    /// Conventionally reported as `+1`
    Inlier,
}

impl Label {
    pub fn value(&self) -> i8 {
        match self {
            Label::Outlier => -1,
            Label::Inlier => 1,
        }
    }

    pub fn is_outlier(&self) -> bool {
        *self == Label::Outlier
    }
}

/// Output of a single inference pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: Label,
    /// Continuous score, lower is more anomalous. Roughly in [-0.5, 0.5]
    /// but not formally bounded.
    pub decision_score: f64,
}

/// Trait for anomaly detection models
pub trait AnomalyModel: Send + Sync {
    /// Train the model on normal data
    fn fit(&mut self, data: &[FeatureVector]);

    /// Run one inference pass. Must not mutate the model.
    fn predict(&self, sample: &FeatureVector) -> Prediction;

    /// Get model name
    fn name(&self) -> &str;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

/// Isolation forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Expected proportion of anomalies, sets the decision threshold
    pub contamination: f64,
    /// Number of trees
    pub n_estimators: usize,
    /// Upper bound on the per-tree sub-sample size
    pub max_samples: usize,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}
