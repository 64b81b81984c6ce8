use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use petropulse_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "petropulse")]
#[command(author, version, about = "Energy news ingestion and sentiment insights")]
struct Cli {
    /// Config file (default: ~/.config/petropulse/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch feeds, enrich relevant articles and store the new ones
    Ingest(commands::ingest::IngestArgs),
    /// List the feed registry
    Feeds {
        /// Only show this category (kebab-case, e.g. lng-shipping)
        #[arg(long)]
        category: Option<String>,
    },
    /// Row counts per source and the most recent articles
    Stats {
        /// Recent articles to show
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Write every stored article as JSON lines
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Mean sentiment per publication day
    Sentiment,
    /// Run ingestion every `schedule.interval_secs` until Ctrl+C
    Daemon,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Ingest(args) => commands::ingest::run(config, args, shutdown_signal()).await,
        Commands::Feeds { category } => commands::feeds::run(&config, category.as_deref()),
        Commands::Stats { limit } => commands::stats::run(&config, limit).await,
        Commands::Export { output } => commands::export::run(&config, &output).await,
        Commands::Sentiment => commands::sentiment::run(&config).await,
        Commands::Daemon => commands::daemon::run(config, shutdown_signal()).await,
    }
}

/// Flips to true on Ctrl+C
fn shutdown_signal() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal, finishing current work");
            let _ = shutdown_tx.send(true);
        }
    });
    shutdown_rx
}
