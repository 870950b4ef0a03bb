//! Model artifact persistence
//!
//! A single bincode file holding the fitted forest together with the feature
//! schema it was fit against.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::features::{FeatureSchema, TX_FEATURE_SCHEMA};
use super::models::{ForestParams, IsolationForest};

/// Upper bound on artifact size and on any single length prefix inside it
pub const MAX_ARTIFACT_BYTES: usize = 64 * 1024 * 1024;

/// Serialized anomaly model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Version of the feature schema the forest was fit against
    pub schema_version: u32,
    /// Feature names in fit order
    pub feature_names: Vec<String>,
    pub forest: IsolationForest,
    pub created_at: DateTime<Utc>,
    /// Crate version that wrote the artifact
    pub version: String,
}

impl ModelArtifact {
    /// Wrap a freshly fitted forest under the current schema
    pub fn new(forest: IsolationForest) -> Self {
        Self {
            schema_version: TX_FEATURE_SCHEMA.version,
            feature_names: TX_FEATURE_SCHEMA.owned_names(),
            forest,
            created_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Whether this artifact was fit against `schema`
    pub fn matches_schema(&self, schema: &FeatureSchema) -> bool {
        schema.matches(self.schema_version, &self.feature_names)
    }

    /// Save to disk, creating parent directories as needed.
    ///
    /// Writes to a sibling temp file first so a failed write never leaves a
    /// truncated artifact behind.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            let mut writer = BufWriter::new(file);
            bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move artifact into {}", path.display()))?;
        Ok(())
    }

    /// Load from disk
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        if len > MAX_ARTIFACT_BYTES as u64 {
            anyhow::bail!("Artifact is {} bytes, limit is {}", len, MAX_ARTIFACT_BYTES);
        }

        let mut reader = BufReader::new(file);
        let config = bincode::config::standard().with_limit::<MAX_ARTIFACT_BYTES>();
        let artifact: Self = bincode::serde::decode_from_std_read(&mut reader, config)
            .context("Artifact is corrupt or not a model file")?;
        Ok(artifact)
    }

    pub fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            schema_version: self.schema_version,
            feature_names: self.feature_names.clone(),
            num_trees: self.forest.num_trees(),
            params: *self.forest.params(),
            offset: self.forest.offset(),
            created_at: self.created_at,
            version: self.version.clone(),
        }
    }
}

/// Artifact summary for operators
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub schema_version: u32,
    pub feature_names: Vec<String>,
    pub num_trees: usize,
    pub params: ForestParams,
    pub offset: f64,
    pub created_at: DateTime<Utc>,
    pub version: String,
}
