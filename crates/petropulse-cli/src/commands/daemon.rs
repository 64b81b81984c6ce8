use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::watch;

use petropulse_core::{
    feed::FeedRegistry,
    pipeline::{IngestOptions, IngestPipeline, SchedulerService},
    storage::Database,
    AppConfig,
};

pub async fn run(config: AppConfig, shutdown: watch::Receiver<bool>) -> Result<()> {
    let interval_secs = config.schedule.interval_secs;
    if interval_secs == 0 {
        bail!("Daemon mode needs schedule.interval_secs > 0 in the config file");
    }

    let registry = FeedRegistry::from_config(&config)?;
    let pipeline = Arc::new(IngestPipeline::from_config(&config)?);
    let db = Database::new(&config).await?;

    let scheduler = SchedulerService::new(
        db,
        pipeline,
        registry.feeds().to_vec(),
        IngestOptions::from_config(&config),
        interval_secs,
    );

    println!(
        "Daemon started (PID: {}). Press Ctrl+C to stop.",
        std::process::id()
    );
    println!("  Feeds: {}", registry.len());
    println!("  Interval: {} seconds", interval_secs);

    // Blocks until shutdown
    scheduler.run(shutdown).await;

    println!("Daemon stopped.");

    Ok(())
}
