use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::feed::FeedSource;
use crate::storage::Database;
use crate::Result;

use super::ingest::{IngestOptions, IngestPipeline, IngestReport};

/// Events emitted after each scheduled cycle
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    CycleCompleted { report: IngestReport },
    Error { message: String },
}

/// Runs ingestion periodically until shutdown
pub struct SchedulerService {
    db: Database,
    pipeline: Arc<IngestPipeline>,
    feeds: Arc<Vec<FeedSource>>,
    options: IngestOptions,
    interval_secs: u64,
    event_tx: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl SchedulerService {
    pub fn new(
        db: Database,
        pipeline: Arc<IngestPipeline>,
        feeds: Vec<FeedSource>,
        options: IngestOptions,
        interval_secs: u64,
    ) -> Self {
        Self {
            db,
            pipeline,
            feeds: Arc::new(feeds),
            options,
            interval_secs,
            event_tx: None,
        }
    }

    /// Set the event sender for cycle notifications
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, event: SchedulerEvent) {
        if let Some(ref tx) = self.event_tx {
            if tx.send(event).is_err() {
                warn!("Failed to send scheduler event: receiver dropped");
            }
        }
    }

    /// Run one cycle now, then one per interval, until the shutdown signal.
    ///
    /// A cycle in progress sees the same signal and commits what it finished.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if self.interval_secs == 0 {
            info!("Scheduler disabled (schedule.interval_secs = 0)");
            let _ = shutdown.wait_for(|stop| *stop).await;
            return;
        }

        info!(
            interval_secs = self.interval_secs,
            feeds = self.feeds.len(),
            "Scheduler started"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // A slow run pushes the next one back instead of queueing a burst
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                }

                _ = interval.tick() => {
                    debug!("Running scheduled ingestion");
                    match self.run_once(shutdown.clone()).await {
                        Ok(report) => {
                            info!(
                                inserted = report.inserted,
                                relevant = report.relevant,
                                feeds_failed = report.feeds_failed,
                                "Scheduled ingestion finished"
                            );
                            self.send_event(SchedulerEvent::CycleCompleted { report });
                        }
                        Err(e) => {
                            error!("Scheduled ingestion failed: {}", e);
                            self.send_event(SchedulerEvent::Error { message: e.to_string() });
                        }
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Run a single ingestion immediately
    pub async fn run_once(&self, shutdown: watch::Receiver<bool>) -> Result<IngestReport> {
        self.pipeline
            .run(&self.db, &self.feeds, &self.options, shutdown)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::feed::FeedCategory;
    use tokio::time::timeout;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.staging = false;
        config.fetch.max_retries = 1;
        config.fetch.request_timeout_secs = 5;
        config
    }

    async fn service(server: &MockServer, interval_secs: u64) -> SchedulerService {
        let config = test_config();
        let pipeline = Arc::new(IngestPipeline::from_config(&config).unwrap());
        let db = Database::new_in_memory().await.unwrap();
        let feeds = vec![FeedSource::new(FeedCategory::Custom, format!("{}/feed", server.uri()))];
        SchedulerService::new(db, pipeline, feeds, IngestOptions::from_config(&config), interval_secs)
    }

    #[tokio::test]
    async fn test_scheduler_runs_cycle_then_stops_on_shutdown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Empty</title></channel></rss>"#,
            ))
            .mount(&server)
            .await;

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let scheduler = service(&server, 3600).await.with_event_sender(event_tx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        let event = timeout(Duration::from_secs(10), event_rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            SchedulerEvent::CycleCompleted { report } => {
                assert_eq!(report.feeds_total, 1);
                assert_eq!(report.feeds_failed, 0);
                assert_eq!(report.inserted, 0);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        shutdown_tx.send(true).unwrap();
        assert!(timeout(Duration::from_secs(5), handle).await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_scheduler_waits_for_shutdown() {
        let server = MockServer::start().await;
        let scheduler = service(&server, 0).await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        shutdown_tx.send(true).unwrap();
        assert!(timeout(Duration::from_secs(1), handle).await.is_ok());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
