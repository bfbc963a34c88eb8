//! Veritas CLI — the main entry point.
//!
//! Commands:
//! - `onboard` — Write a starter config file
//! - `chat`    — Interactive verification or single-claim mode
//! - `serve`   — Start the HTTP gateway with the web UI
//! - `doctor`  — Diagnose configuration

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "veritas",
    about = "Veritas — verify claims against live web search with a streaming LLM",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to ~/.veritas/config.toml)
    #[arg(short, long, global = true, env = "VERITAS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Onboard,

    /// Verify claims interactively
    Chat {
        /// Verify a single claim instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Start the HTTP gateway and web UI
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Diagnose configuration health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Chat { message } => return commands::chat::run(config_path, message).await,
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(ExitCode::SUCCESS)
}
