//! Transaction feature extraction
//!
//! Turns a loosely-typed JSON payload into the fixed-order numeric vector the
//! anomaly model was fit against. The order lives in [`TX_FEATURE_SCHEMA`] and
//! nowhere else; the model artifact records the schema it was fit with so a
//! reordered or extended schema is caught at load time instead of silently
//! corrupting inference.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::{Result, ScorerError};

/// Number of features in a transaction vector
pub const NUM_FEATURES: usize = 8;

/// Named, versioned feature ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSchema {
    pub version: u32,
    pub names: [&'static str; NUM_FEATURES],
}

impl FeatureSchema {
    /// Position of a feature by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|&n| n == name)
    }

    /// Whether a recorded schema (e.g. from a model artifact) matches this one
    pub fn matches(&self, version: u32, names: &[String]) -> bool {
        version == self.version
            && names.len() == NUM_FEATURES
            && names.iter().zip(self.names.iter()).all(|(a, b)| a == b)
    }

    pub fn owned_names(&self) -> Vec<String> {
        self.names.iter().map(|n| n.to_string()).collect()
    }
}

/// Current transaction feature schema. Bump `version` on any change to `names`.
pub const TX_FEATURE_SCHEMA: FeatureSchema = FeatureSchema {
    version: 1,
    names: [
        "num_inputs",
        "num_outputs",
        "total_input",
        "total_output",
        "fee",
        "fee_rate",
        "change_ratio",
        "input_diversity",
    ],
};

/// Ordered feature vector, laid out per [`TX_FEATURE_SCHEMA`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; NUM_FEATURES],
}

impl FeatureVector {
    pub fn new(values: [f64; NUM_FEATURES]) -> Self {
        Self { values }
    }

    /// Get feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        TX_FEATURE_SCHEMA.index_of(name).map(|idx| self.values[idx])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

fn number_or_default<'de, D>(d: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(d)?.unwrap_or_default())
}

/// Transaction features as sent by the node. Every field is optional and
/// defaults to 0; `null` is treated the same as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TxFeatures {
    #[serde(deserialize_with = "number_or_default")]
    pub num_inputs: f64,
    #[serde(deserialize_with = "number_or_default")]
    pub num_outputs: f64,
    #[serde(deserialize_with = "number_or_default")]
    pub total_input: f64,
    #[serde(deserialize_with = "number_or_default")]
    pub total_output: f64,
    #[serde(deserialize_with = "number_or_default")]
    pub fee: f64,
    #[serde(deserialize_with = "number_or_default")]
    pub fee_rate: f64,
    #[serde(deserialize_with = "number_or_default")]
    pub change_ratio: f64,
    #[serde(deserialize_with = "number_or_default")]
    pub input_diversity: f64,
}

impl TxFeatures {
    /// Extract features from a raw request body.
    ///
    /// Fails only when the body is empty, not JSON, or not a JSON object, or
    /// when a present field is not a number. Missing fields are never an error.
    pub fn from_json_slice(body: &[u8]) -> Result<Self> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ScorerError::InvalidRequest("No JSON data provided".into()));
        }

        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| ScorerError::InvalidRequest(format!("malformed JSON: {}", e)))?;

        Self::from_value(value)
    }

    /// Extract features from an already-parsed JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let object = match value {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(ScorerError::InvalidRequest(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        let missing: Vec<&str> = TX_FEATURE_SCHEMA
            .names
            .iter()
            .copied()
            .filter(|name| !object.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            debug!("Defaulting missing features to 0: {:?}", missing);
        }

        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| ScorerError::InvalidRequest(format!("invalid feature value: {}", e)))
    }

    /// Feature vector in schema order
    pub fn to_vector(&self) -> FeatureVector {
        FeatureVector::new([
            self.num_inputs,
            self.num_outputs,
            self.total_input,
            self.total_output,
            self.fee,
            self.fee_rate,
            self.change_ratio,
            self.input_diversity,
        ])
    }

    /// Short description for log lines
    pub fn summary(&self) -> String {
        format!(
            "inputs={} outputs={} in={} out={} fee={} fee_rate={}",
            self.num_inputs,
            self.num_outputs,
            self.total_input,
            self.total_output,
            self.fee,
            self.fee_rate
        )
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
