//! Transaction anomaly model
//!
//! # Features
//! - Fixed-order, versioned feature schema for transactions
//! - Isolation forest with a contamination-derived decision boundary
//! - Load-or-bootstrap model lifecycle with a single persisted artifact
//!
//! # Example
//! ```ignore
//! use ai_scorer::config::ModelConfig;
//! use ai_scorer::ml::{ModelManager, TxFeatures};
//!
//! let manager = ModelManager::new(ModelConfig::default());
//! manager.ensure_loaded()?;
//!
//! let features = TxFeatures::from_json_slice(br#"{"fee": 1.0, "fee_rate": 0.01}"#)?;
//! let prediction = manager.predict(&features.to_vector())?;
//! println!("decision score: {}", prediction.decision_score);
//! ```

pub mod features;
pub mod manager;
pub mod models;
pub mod storage;

pub use features::{FeatureSchema, FeatureVector, TxFeatures, NUM_FEATURES, TX_FEATURE_SCHEMA};
pub use manager::{bootstrap_sample, ModelManager, BOOTSTRAP_SAMPLE};
pub use models::{AnomalyModel, ForestParams, IsolationForest, Label, Prediction};
pub use storage::{ArtifactInfo, ModelArtifact};
