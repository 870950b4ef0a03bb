use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use ai_scorer::api::{self, AppState};
use ai_scorer::config::ScorerConfig;
use ai_scorer::ml::{ModelArtifact, ModelManager};
use ai_scorer::scoring::ScoringService;

#[derive(Parser)]
#[command(name = "ai-scorer")]
#[command(author, version, about = "Advisory transaction anomaly and fee-adequacy scorer")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load or create the model and serve the HTTP API
    Serve {
        /// Listening port (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Model artifact path (overrides config)
        #[arg(short, long)]
        model_path: Option<PathBuf>,
    },

    /// Score one JSON transaction payload and print the result
    Score {
        /// Read the payload from a file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show metadata of the persisted model artifact
    ModelInfo,

    /// Generate default configuration file
    GenConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run_command(cli: Cli) -> Result<()> {
    let mut config = ScorerConfig::load_or_default(cli.config.as_deref())?;
    config.apply_env()?;
    config.validate()?;

    match cli.command {
        Commands::Serve { port, model_path } => cmd_serve(config, port, model_path).await,
        Commands::Score { input } => cmd_score(config, input),
        Commands::ModelInfo => cmd_model_info(config),
        Commands::GenConfig { output } => cmd_gen_config(output),
    }
}

async fn cmd_serve(
    mut config: ScorerConfig,
    port: Option<u16>,
    model_path: Option<PathBuf>,
) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(path) = model_path {
        config.model.path = path;
    }

    // A corrupt artifact aborts startup rather than being replaced
    let models = ModelManager::new(config.model.clone());
    models
        .ensure_loaded()
        .context("Failed to initialize anomaly model")?;
    info!("Model ready ({})", models.model_path().display());

    let state = Arc::new(AppState::new(models));
    api::serve(&config.server, state).await
}

fn cmd_score(config: ScorerConfig, input: Option<PathBuf>) -> Result<()> {
    let body = match input {
        Some(path) => std::fs::read(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read payload from stdin")?;
            buf
        }
    };

    let models = ModelManager::new(config.model);
    let model = models.ensure_loaded()?;
    let response = ScoringService::new(model).score_payload(&body)?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn cmd_model_info(config: ScorerConfig) -> Result<()> {
    let path = &config.model.path;
    if !path.exists() {
        println!(
            "No model artifact at {} (one is created on first serve)",
            path.display()
        );
        return Ok(());
    }

    let artifact = ModelArtifact::load(path)?;
    println!("{}", serde_json::to_string_pretty(&artifact.info())?);
    Ok(())
}

fn cmd_gen_config(output: Option<PathBuf>) -> Result<()> {
    let config = ScorerConfig::default();
    let toml_str = toml::to_string_pretty(&config)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &toml_str)?;
            println!("Configuration written to {}", path.display());
        }
        None => {
            println!("{}", toml_str);
        }
    }

    Ok(())
}
