use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("failed to persist model to {path}: {reason}")]
    ModelPersist { path: PathBuf, reason: String },

    #[error("anomaly model not loaded")]
    ModelNotLoaded,

    #[error("scoring failed: {0}")]
    InternalScoring(String),
}

impl ScorerError {
    /// True for errors caused by the caller rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, ScorerError::InvalidRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, ScorerError>;
