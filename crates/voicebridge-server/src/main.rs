use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};

use voicebridge_core::config::Config;
use voicebridge_providers::OpenAiProvider;
use voicebridge_rooms::DailyClient;
use voicebridge_server::{start_server, AppState};

#[derive(Parser)]
#[command(
    name = "voicebridge",
    about = "Voice/video bot server — rooms, streaming LLM, and websocket TTS in a single Rust binary",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (JSON5; optional — env vars alone are enough)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// Port to listen on (default: 7860, env: FAST_API_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate configuration and credentials, then exit
    Check,
}

fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Ok(Config::load(std::path::Path::new(path))?),
        None => Ok(Config::from_env()),
    }
}

fn build_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let daily_key = config
        .daily
        .resolve_api_key()
        .ok_or_else(|| anyhow::anyhow!("{} is not set", config.daily.api_key_env))?;
    let openai_key = config
        .openai
        .resolve_api_key()
        .ok_or_else(|| anyhow::anyhow!("{} is not set", config.openai.api_key_env))?;

    let daily = DailyClient::new(&config.daily.base_url, daily_key);
    let provider = Arc::new(OpenAiProvider::new(openai_key, Some(&config.openai.base_url)));

    Ok(Arc::new(AppState::new(Arc::new(config), daily, provider)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }

            let (warnings, errors) = config.validate();
            for warning in &warnings {
                tracing::warn!("{warning}");
            }
            if !errors.is_empty() {
                for error in &errors {
                    tracing::error!("{error}");
                }
                bail!("Configuration is invalid ({} error(s))", errors.len());
            }

            let state = build_state(config)?;
            start_server(state).await?;
        }
        Commands::Check => {
            let (warnings, errors) = config.validate();
            for warning in &warnings {
                println!("warning: {warning}");
            }
            for error in &errors {
                println!("error: {error}");
            }
            if errors.is_empty() {
                println!("Configuration OK");
            } else {
                bail!("Configuration is invalid ({} error(s))", errors.len());
            }
        }
    }

    Ok(())
}
