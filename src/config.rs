use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ml::models::ForestParams;

/// Environment variable overriding the listening port
pub const PORT_ENV: &str = "PORT";
/// Environment variable overriding the model artifact path
pub const MODEL_PATH_ENV: &str = "AI_SCORER_MODEL_PATH";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScorerConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub model: ModelConfig,
}

impl ScorerConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: ScorerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load from an explicit path, `ai-scorer.toml` in the working directory,
    /// or fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let local = PathBuf::from("ai-scorer.toml");
        if local.exists() {
            return Self::load(&local);
        }

        Ok(Self::default())
    }

    /// Apply `PORT` / `AI_SCORER_MODEL_PATH` from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("{} is not a valid port: {:?}", PORT_ENV, port))?;
        }
        if let Some(path) = lookup(MODEL_PATH_ENV).filter(|p| !p.is_empty()) {
            self.model.path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Reject hyperparameters the forest cannot work with
    pub fn validate(&self) -> Result<()> {
        let model = &self.model;
        if !(model.contamination > 0.0 && model.contamination <= 0.5) {
            bail!(
                "model.contamination must be in (0, 0.5], got {}",
                model.contamination
            );
        }
        if model.n_estimators == 0 {
            bail!("model.n_estimators must be at least 1");
        }
        if model.max_samples == 0 {
            bail!("model.max_samples must be at least 1");
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Serialized model artifact
    #[serde(default = "default_model_path")]
    pub path: PathBuf,

    /// Expected proportion of anomalies
    #[serde(default = "default_contamination")]
    pub contamination: f64,

    /// Number of isolation trees
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Upper bound on per-tree sub-sample size
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// Random seed used when fitting a fresh model
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl ModelConfig {
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            contamination: self.contamination,
            n_estimators: self.n_estimators,
            max_samples: self.max_samples,
            seed: self.seed,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            contamination: default_contamination(),
            n_estimators: default_n_estimators(),
            max_samples: default_max_samples(),
            seed: default_seed(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/tx_anomaly_model.bin")
}

fn default_contamination() -> f64 {
    0.1
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_samples() -> usize {
    256
}

fn default_seed() -> u64 {
    42
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ScorerConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.model.path, PathBuf::from("models/tx_anomaly_model.bin"));
        assert_eq!(config.model.forest_params(), ForestParams::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ai-scorer.toml");
        std::fs::write(&path, "[model]\nn_estimators = 25\n").unwrap();

        let config = ScorerConfig::load(&path).unwrap();
        assert_eq!(config.model.n_estimators, 25);
        assert_eq!(config.model.contamination, 0.1);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ai-scorer.toml");
        let mut config = ScorerConfig::default();
        config.server.port = 6100;
        config.save(&path).unwrap();

        assert_eq!(ScorerConfig::load(&path).unwrap().server.port, 6100);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ScorerConfig::default();
        config
            .apply_env_from(|key| match key {
                PORT_ENV => Some("8080".to_string()),
                MODEL_PATH_ENV => Some("/tmp/m.bin".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.model.path, PathBuf::from("/tmp/m.bin"));
    }

    #[test]
    fn test_bad_port_env_is_rejected() {
        let mut config = ScorerConfig::default();
        let result = config.apply_env_from(|key| (key == PORT_ENV).then(|| "http".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_params() {
        let mut config = ScorerConfig::default();
        config.model.contamination = 0.0;
        assert!(config.validate().is_err());

        let mut config = ScorerConfig::default();
        config.model.n_estimators = 0;
        assert!(config.validate().is_err());
    }
}
