use std::any::Any;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::{SharedState, SERVICE_NAME};
use crate::error::ScorerError;
use crate::ml::TxFeatures;
use crate::scoring::{score_peer as peer_stub, PeerScore, ScoreResponse, ScoringService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub model_loaded: bool,
}

/// Request-scoped error, rendered as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError(pub ScorerError);

impl From<ScorerError> for ApiError {
    fn from(err: ScorerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            warn!("Rejected request: {}", self.0);
            StatusCode::BAD_REQUEST
        } else {
            error!("Request failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        model_loaded: state.models.is_loaded(),
    })
}

pub async fn score_tx(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<ScoreResponse>, ApiError> {
    let features = TxFeatures::from_json_slice(&body)?;
    let model = state.models.model().ok_or(ScorerError::ModelNotLoaded)?;

    let response = ScoringService::new(model).score(&features)?;
    Ok(Json(response))
}

pub async fn score_peer(body: Bytes) -> Json<PeerScore> {
    Json(peer_stub(&body))
}

/// Turns a handler panic into a plain 500 instead of a dropped connection
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "internal scoring error" })),
    )
        .into_response()
}
