use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use moltsearch_gateway::Config;
use moltsearch_gateway::api::{ApiServer, ApiState};

/// Moltsearch - voice and text search gateway for Moltbook
#[derive(Parser)]
#[command(name = "moltsearch", version, about)]
struct Cli {
    /// Address to bind
    #[arg(long, env = "MOLTSEARCH_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "MOLTSEARCH_PORT")]
    port: Option<u16>,

    /// Path to a TOML config file (defaults to the platform config dir)
    #[arg(short, long, env = "MOLTSEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,moltsearch_gateway=info",
        1 => "info,moltsearch_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // Missing keys degrade their routes to 503 instead of refusing to start
    if config.api_keys.exa.is_none() {
        tracing::warn!("EXA_API_KEY not set, search routes unavailable");
    }
    if config.api_keys.gemini.is_none() {
        tracing::warn!("GEMINI_API_KEY not set, answer routes unavailable");
    }
    if config.api_keys.elevenlabs.is_none() {
        tracing::warn!("ELEVENLABS_API_KEY not set, speech routes unavailable");
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "starting moltsearch gateway"
    );

    let state = Arc::new(ApiState::from_config(Arc::new(config)));
    ApiServer::new(state).run().await?;

    Ok(())
}
