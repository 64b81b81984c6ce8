use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tokio::sync::watch;

use petropulse_core::{
    feed::FeedRegistry,
    pipeline::{IngestOptions, IngestPipeline},
    storage::Database,
    AppConfig,
};

#[derive(Args, Debug, Default)]
pub struct IngestArgs {
    /// Only keep items published within the last N days [default: 30]
    #[arg(long)]
    pub days: Option<u32>,
    /// Max items taken from each feed [default: 30]
    #[arg(long)]
    pub per_feed: Option<usize>,
    /// Feeds fetched in parallel
    #[arg(long)]
    pub feed_concurrency: Option<usize>,
    /// Article pages downloaded in parallel
    #[arg(long)]
    pub extract_concurrency: Option<usize>,
    /// Deadline per feed in seconds
    #[arg(long)]
    pub feed_timeout: Option<u64>,
    /// Extra feeds from an OPML file
    #[arg(long)]
    pub opml: Option<PathBuf>,
    /// Restrict to a registry category (repeatable)
    #[arg(long = "category")]
    pub categories: Vec<String>,
}

impl IngestArgs {
    /// Flags take precedence over the config file
    pub fn apply(self, config: &mut AppConfig) {
        if let Some(days) = self.days {
            config.fetch.days = days;
        }
        if let Some(per_feed) = self.per_feed {
            config.fetch.per_feed_limit = per_feed;
        }
        if let Some(n) = self.feed_concurrency {
            config.fetch.concurrency = n;
        }
        if let Some(n) = self.extract_concurrency {
            config.extract.concurrency = n;
        }
        if let Some(secs) = self.feed_timeout {
            config.fetch.feed_timeout_secs = secs;
        }
        if self.opml.is_some() {
            config.fetch.opml_path = self.opml;
        }
        if !self.categories.is_empty() {
            config.fetch.categories = self.categories;
        }
    }
}

pub async fn run(
    mut config: AppConfig,
    args: IngestArgs,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    args.apply(&mut config);

    let registry = FeedRegistry::from_config(&config)?;
    let pipeline = IngestPipeline::from_config(&config)?;
    let options = IngestOptions::from_config(&config);
    let db = Database::new(&config).await?;

    println!(
        "Ingesting {} feeds (last {} days, up to {} items per feed)...\n",
        registry.len(),
        options.days,
        options.fetch.per_feed
    );

    let report = pipeline.run(&db, registry.feeds(), &options, shutdown).await?;

    println!("{}", report);

    Ok(())
}
