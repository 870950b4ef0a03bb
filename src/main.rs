use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;

use cli::{run_command, Cli};

const DEFAULT_FILTER: &str = "ai_scorer=info,tower_http=info";
const DEBUG_FILTER: &str = "ai_scorer=debug,tower_http=debug";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new(DEBUG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    // Logs go to stderr so `score` output on stdout stays machine-readable
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = run_command(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
