//! Shipwright CLI entrypoint.

use clap::Parser;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod client;
mod commands;
mod config;
mod handlers;

use commands::Commands;
use config::{LogFormat, ServerConfig};

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(author, version, about = "Single-flight continuous deployment daemon", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./shipwright.yaml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let config = ServerConfig::load(cli.config.as_deref())?;
    init_logging(config.log_format);
    exit_on_panic();

    match cli.command {
        Commands::Serve => handlers::serve(&config).await?,
        Commands::Targets => handlers::list_targets(&config).await?,
        Commands::Deploy { name, detach } => handlers::deploy(&config, &name, detach).await?,
    }

    Ok(())
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// A panic anywhere, including inside a spawned deployment task, is a
/// defect: log it and exit so the supervisor restarts the daemon.
fn exit_on_panic() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!(panic = %info, "Uncaught defect, exiting");
        default_hook(info);
        std::process::exit(1);
    }));
}
