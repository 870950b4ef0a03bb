//! Advisory transaction scoring
//!
//! Produces two independent scores for a transaction:
//! - `anomaly_score`: the forest's decision score mapped onto [0, 1]
//! - `fee_adequacy`: a fixed heuristic over fee and fee rate
//!
//! Scores are advisory. Callers keep their own fallback for when the service
//! is unavailable, so a request either gets both scores or an error.

pub mod peer;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{Result, ScorerError};
use crate::ml::features::TxFeatures;
use crate::ml::models::{AnomalyModel, Label, Prediction};

pub use peer::{score_peer, PeerScore};

pub const SCORED_MESSAGE: &str = "Transaction scored successfully";

/// Response returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    /// 0.0 = normal, 1.0 = highly anomalous
    pub anomaly_score: f64,
    /// 0.0 = low fee, 1.0 = high fee
    pub fee_adequacy: f64,
    pub message: String,
}

/// Scoring result with the diagnostics that never leave the service
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TxScore {
    pub anomaly_score: f64,
    pub fee_adequacy: f64,
    pub prediction: Prediction,
}

impl TxScore {
    /// Discrete model verdict, superseded by `anomaly_score` for callers
    pub fn label(&self) -> Label {
        self.prediction.label
    }

    pub fn into_response(self) -> ScoreResponse {
        ScoreResponse {
            anomaly_score: self.anomaly_score,
            fee_adequacy: self.fee_adequacy,
            message: SCORED_MESSAGE.to_string(),
        }
    }
}

/// Map a decision score (roughly [-0.5, 0.5], lower = more anomalous) onto
/// [0, 1] where 1 is most anomalous. Out-of-range inputs are clamped.
pub fn normalize_decision_score(decision_score: f64) -> f64 {
    (0.5 - decision_score).clamp(0.0, 1.0)
}

/// Fee adequacy heuristic.
///
/// Not learned: `fee_rate` is scaled so that a rate of 0.01 or more counts as
/// fully adequate, and the result is halved when the absolute fee is below
/// 0.1. Stands in for a regression model until one is trained.
pub fn fee_adequacy(fee: f64, fee_rate: f64) -> f64 {
    let adequacy = (fee_rate * 100.0).clamp(0.0, 1.0);
    if fee < 0.1 {
        adequacy * 0.5
    } else {
        adequacy
    }
}

/// Scores transactions against an injected anomaly model
#[derive(Clone)]
pub struct ScoringService {
    model: Arc<dyn AnomalyModel>,
}

impl ScoringService {
    pub fn new(model: Arc<dyn AnomalyModel>) -> Self {
        Self { model }
    }

    /// Score extracted features
    pub fn score_transaction(&self, features: &TxFeatures) -> Result<TxScore> {
        let prediction = self.model.predict(&features.to_vector());
        if !prediction.decision_score.is_finite() {
            return Err(ScorerError::InternalScoring(format!(
                "{} returned non-finite decision score {}",
                self.model.name(),
                prediction.decision_score
            )));
        }

        let anomaly_score = normalize_decision_score(prediction.decision_score);
        let fee_adequacy = fee_adequacy(features.fee, features.fee_rate);

        Ok(TxScore {
            anomaly_score,
            fee_adequacy,
            prediction,
        })
    }

    /// Score features and build the caller-facing response
    pub fn score(&self, features: &TxFeatures) -> Result<ScoreResponse> {
        let score = self.score_transaction(features).map_err(|e| {
            error!("Error scoring transaction ({}): {}", features.summary(), e);
            e
        })?;

        info!(
            "Scored transaction: anomaly={:.2}, fee={:.2}, label={}",
            score.anomaly_score,
            score.fee_adequacy,
            score.label().value()
        );
        Ok(score.into_response())
    }

    /// Extract features from a raw body, then [`score`](Self::score) them
    pub fn score_payload(&self, body: &[u8]) -> Result<ScoreResponse> {
        let features = TxFeatures::from_json_slice(body)?;
        self.score(&features)
    }
}
