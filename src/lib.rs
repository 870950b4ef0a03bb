//! Advisory transaction scoring service.
//!
//! Assigns an anomaly score and a fee-adequacy score to a transaction feature
//! vector. Scores inform prioritization only; callers must keep working when
//! the service is unavailable.

pub mod api;
pub mod config;
pub mod error;
pub mod ml;
pub mod scoring;

pub use config::ScorerConfig;
pub use error::{Result, ScorerError};
pub use ml::{ModelManager, TxFeatures};
pub use scoring::{ScoreResponse, ScoringService};
