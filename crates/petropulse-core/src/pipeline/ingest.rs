use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::config::AppConfig;
use crate::extract::{ArticleExtractor, Extraction, ExtractionOutcome};
use crate::feed::{fetch_entries, EnrichedArticle, FeedFetcher, FeedSource, FetchOptions, RawEntry};
use crate::nlp::{Enricher, Enrichment};
use crate::relevance::{combined_text, RelevanceFilter};
use crate::storage::{ArticleRepository, Database, StagingArea};
use crate::{Error, Result};

/// Per-run knobs, resolved from config and CLI overrides
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Keep entries published within the last N days
    pub days: u32,
    pub fetch: FetchOptions,
    pub extract_concurrency: usize,
    pub enrich_workers: usize,
}

impl IngestOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            days: config.fetch.days,
            fetch: FetchOptions::from_config(config),
            extract_concurrency: config.extract.concurrency.max(1),
            enrich_workers: config.enrich_workers().max(1),
        }
    }
}

/// Counters for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub feeds_total: usize,
    pub feeds_failed: usize,
    pub fetched: usize,
    pub in_window: usize,
    pub already_known: usize,
    pub extracted: usize,
    pub empty: usize,
    pub failed_extractions: usize,
    pub relevant: usize,
    pub enriched: usize,
    pub inserted: u64,
    pub duplicates: u64,
    /// Rows inserted from batches staged by earlier runs
    pub replayed: u64,
    pub cancelled: bool,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Feeds:      {} ok, {} failed ({} total)",
            self.feeds_total.saturating_sub(self.feeds_failed),
            self.feeds_failed,
            self.feeds_total
        )?;
        writeln!(
            f,
            "Entries:    {} fetched, {} in window, {} already stored",
            self.fetched, self.in_window, self.already_known
        )?;
        writeln!(
            f,
            "Extraction: {} with text, {} empty, {} failed",
            self.extracted, self.empty, self.failed_extractions
        )?;
        writeln!(f, "Relevant:   {} ({} enriched)", self.relevant, self.enriched)?;
        write!(
            f,
            "Inserted:   {} new, {} duplicates",
            self.inserted, self.duplicates
        )?;
        if self.replayed > 0 {
            write!(f, ", {} from staged batches", self.replayed)?;
        }
        if self.cancelled {
            write!(f, "\nRun was cancelled; finished articles were kept")?;
        }
        Ok(())
    }
}

/// Windowed feed entries awaiting extraction
#[derive(Debug, Default)]
pub struct Candidates {
    pub entries: Vec<RawEntry>,
    pub report: IngestReport,
}

/// Enriched articles ready to commit
#[derive(Debug, Default)]
pub struct Collected {
    pub articles: Vec<EnrichedArticle>,
    pub report: IngestReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub inserted: u64,
    pub duplicates: u64,
    pub replayed_batches: usize,
    pub replayed: u64,
}

/// Keep entries published no earlier than `days` before `now`
pub fn filter_by_date(entries: Vec<RawEntry>, days: u32, now: DateTime<Utc>) -> Vec<RawEntry> {
    let cutoff = now - ChronoDuration::days(i64::from(days));
    entries
        .into_iter()
        .filter(|e| e.published_at >= cutoff)
        .collect()
}

/// Fetch, extract, filter, enrich and store energy news
pub struct IngestPipeline {
    fetcher: Arc<FeedFetcher>,
    extractor: Arc<ArticleExtractor>,
    enricher: Arc<Enricher>,
    relevance: Arc<RelevanceFilter>,
    staging: Option<StagingArea>,
}

impl IngestPipeline {
    pub fn new(
        config: &AppConfig,
        fetcher: Arc<FeedFetcher>,
        extractor: Arc<ArticleExtractor>,
        enricher: Arc<Enricher>,
        relevance: RelevanceFilter,
    ) -> Self {
        let staging = config
            .storage
            .staging
            .then(|| StagingArea::new(config.staging_dir()));

        Self {
            fetcher,
            extractor,
            enricher,
            relevance: Arc::new(relevance),
            staging,
        }
    }

    /// Build every stage with its built-in backend
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let fetcher = FeedFetcher::new(config)?;
        let extractor = ArticleExtractor::from_config(&config.extract)?;
        let enricher = Enricher::from_config(&config.enrich)?;
        let relevance = RelevanceFilter::default().with_extra_keywords(&config.enrich.extra_keywords);

        tracing::debug!(
            strategies = ?extractor.strategy_names(),
            keywords = relevance.len(),
            "Pipeline ready"
        );

        Ok(Self::new(
            config,
            Arc::new(fetcher),
            Arc::new(extractor),
            Arc::new(enricher),
            relevance,
        ))
    }

    pub fn staging(&self) -> Option<&StagingArea> {
        self.staging.as_ref()
    }

    /// Fetch all feeds and apply the date window
    pub async fn fetch_candidates(
        &self,
        feeds: &[FeedSource],
        options: &IngestOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Candidates {
        let outcome = fetch_entries(Arc::clone(&self.fetcher), feeds, &options.fetch, shutdown).await;

        let mut report = IngestReport {
            feeds_total: feeds.len(),
            feeds_failed: outcome.failures.len(),
            fetched: outcome.entries.len(),
            cancelled: outcome.cancelled,
            ..IngestReport::default()
        };

        let entries = filter_by_date(outcome.entries, options.days, Utc::now());
        report.in_window = entries.len();

        tracing::info!(
            feeds = report.feeds_total,
            failed = report.feeds_failed,
            fetched = report.fetched,
            in_window = report.in_window,
            days = options.days,
            "Feeds fetched"
        );

        Candidates { entries, report }
    }

    /// Extract, filter and enrich candidates whose URL is not in `known_urls`.
    ///
    /// Cancellation aborts in-flight work; articles already enriched are returned.
    pub async fn process(
        &self,
        candidates: Candidates,
        options: &IngestOptions,
        known_urls: &HashSet<String>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Collected {
        let Candidates { entries, mut report } = candidates;

        let before = entries.len();
        let entries: Vec<RawEntry> = entries
            .into_iter()
            .filter(|e| !known_urls.contains(&e.url))
            .collect();
        report.already_known = before - entries.len();

        let mut articles = Vec::new();
        if report.cancelled || entries.is_empty() {
            return Collected { articles, report };
        }

        let extract_permits = Arc::new(Semaphore::new(options.extract_concurrency.max(1)));
        let enrich_permits = Arc::new(Semaphore::new(options.enrich_workers.max(1)));
        let mut extracting: JoinSet<(RawEntry, Extraction)> = JoinSet::new();
        let mut enriching: JoinSet<(RawEntry, String, Result<Enrichment>)> = JoinSet::new();

        for entry in entries {
            let extractor = Arc::clone(&self.extractor);
            let permits = Arc::clone(&extract_permits);
            extracting.spawn(async move {
                let extraction = match permits.acquire_owned().await {
                    Ok(_permit) => extractor.extract(&entry.url).await,
                    Err(_) => Extraction {
                        text: String::new(),
                        outcome: ExtractionOutcome::Failed,
                    },
                };
                (entry, extraction)
            });
        }

        loop {
            if extracting.is_empty() && enriching.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = extracting.join_next(), if !extracting.is_empty() => {
                    let (entry, extraction) = match joined {
                        Ok(done) => done,
                        Err(e) => {
                            if !e.is_cancelled() {
                                tracing::error!(error = %e, "Extraction task panicked");
                                report.failed_extractions += 1;
                            }
                            continue;
                        }
                    };

                    match extraction.outcome {
                        ExtractionOutcome::Extracted { .. } => report.extracted += 1,
                        ExtractionOutcome::Empty => report.empty += 1,
                        ExtractionOutcome::Failed => report.failed_extractions += 1,
                    }

                    let combined = combined_text(&entry.title, &entry.summary, &extraction.text);
                    match self.relevance.matched_keyword(&combined) {
                        Some(keyword) => {
                            tracing::debug!(url = %entry.url, keyword, "Relevant article");
                        }
                        None => {
                            tracing::debug!(url = %entry.url, "Dropping off-topic article");
                            continue;
                        }
                    }
                    report.relevant += 1;

                    let enricher = Arc::clone(&self.enricher);
                    let permits = Arc::clone(&enrich_permits);
                    let text = extraction.text;
                    enriching.spawn(async move {
                        let _permit = match permits.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => {
                                return (entry, text, Err(Error::Enrichment("enrichment pool closed".to_string())));
                            }
                        };
                        let title = entry.title.clone();
                        let body = text.clone();
                        let enrichment = tokio::task::spawn_blocking(move || enricher.enrich(&title, &body))
                            .await
                            .map_err(|e| Error::Enrichment(format!("Task join error: {}", e)));
                        (entry, text, enrichment)
                    });
                }

                Some(joined) = enriching.join_next(), if !enriching.is_empty() => {
                    let (entry, text, enrichment) = match joined {
                        Ok(done) => done,
                        Err(e) => {
                            if !e.is_cancelled() {
                                tracing::error!(error = %e, "Enrichment task panicked");
                            }
                            continue;
                        }
                    };

                    // A failed enrichment still yields a storable article
                    let enrichment = enrichment.unwrap_or_else(|e| {
                        tracing::warn!(url = %entry.url, error = %e, "Enrichment failed");
                        Enrichment::default()
                    });
                    report.enriched += 1;
                    articles.push(into_article(entry, text, enrichment));
                }

                _ = wait_for_shutdown(&mut shutdown) => {
                    tracing::warn!(
                        extracting = extracting.len(),
                        enriching = enriching.len(),
                        kept = articles.len(),
                        "Ingestion cancelled"
                    );
                    extracting.abort_all();
                    enriching.abort_all();
                    report.cancelled = true;
                    break;
                }
            }
        }

        tracing::info!(
            extracted = report.extracted,
            empty = report.empty,
            failed = report.failed_extractions,
            relevant = report.relevant,
            enriched = report.enriched,
            "Articles processed"
        );

        Collected { articles, report }
    }

    /// Fetch and process without consulting the store
    pub async fn collect(
        &self,
        feeds: &[FeedSource],
        options: &IngestOptions,
        known_urls: &HashSet<String>,
        shutdown: watch::Receiver<bool>,
    ) -> Collected {
        let candidates = self.fetch_candidates(feeds, options, shutdown.clone()).await;
        self.process(candidates, options, known_urls, shutdown).await
    }

    /// Replay staged batches, then stage and insert `articles`.
    ///
    /// Only a failed insert is an error (`StoreUnavailable`), and staged files
    /// stay on disk for the next commit. Staging I/O problems are logged.
    pub async fn commit(
        db: &Database,
        staging: Option<&StagingArea>,
        articles: &[EnrichedArticle],
    ) -> Result<CommitReport> {
        let repo = ArticleRepository::new(db);
        let mut report = CommitReport::default();

        let current: Option<PathBuf> = match staging {
            Some(area) => match area.stage(articles) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(dir = %area.dir().display(), error = %e, "Could not stage batch");
                    None
                }
            },
            None => None,
        };

        if let Some(area) = staging {
            let pending = area.pending().unwrap_or_else(|e| {
                tracing::warn!(dir = %area.dir().display(), error = %e, "Could not list staged batches");
                Vec::new()
            });

            for path in pending {
                if current.as_ref() == Some(&path) {
                    continue;
                }
                let batch = match area.load(&path) {
                    Ok(batch) => batch,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Unreadable staged batch");
                        quarantine(area, &path);
                        continue;
                    }
                };
                let inserted = repo.insert_new(&batch).await.map_err(store_unavailable)?;
                discard(area, &path);

                tracing::info!(path = %path.display(), inserted, "Replayed staged batch");
                report.replayed_batches += 1;
                report.replayed += inserted;
            }
        }

        report.inserted = repo.insert_new(articles).await.map_err(store_unavailable)?;
        report.duplicates = (articles.len() as u64).saturating_sub(report.inserted);

        if let (Some(area), Some(path)) = (staging, current.as_ref()) {
            discard(area, path);
        }

        Ok(report)
    }

    /// One full ingestion run against `db`
    pub async fn run(
        &self,
        db: &Database,
        feeds: &[FeedSource],
        options: &IngestOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Result<IngestReport> {
        let candidates = self.fetch_candidates(feeds, options, shutdown.clone()).await;

        let urls: Vec<String> = candidates.entries.iter().map(|e| e.url.clone()).collect();
        let known = match ArticleRepository::new(db).existing_urls(&urls).await {
            Ok(known) => known,
            Err(e) => {
                // Work continues; the batch is staged and inserted later
                tracing::warn!(error = %e, "Could not read stored URLs");
                HashSet::new()
            }
        };

        let collected = self.process(candidates, options, &known, shutdown).await;
        let commit = Self::commit(db, self.staging(), &collected.articles).await?;

        let mut report = collected.report;
        report.inserted = commit.inserted;
        report.duplicates = commit.duplicates;
        report.replayed = commit.replayed;

        tracing::info!(
            inserted = report.inserted,
            duplicates = report.duplicates,
            replayed = report.replayed,
            cancelled = report.cancelled,
            "Ingestion run finished"
        );

        Ok(report)
    }
}

fn into_article(entry: RawEntry, text: String, enrichment: Enrichment) -> EnrichedArticle {
    EnrichedArticle {
        source: entry.source_name,
        title: entry.title,
        url: entry.url,
        published_at: entry.published_at,
        text,
        sentiment: enrichment.sentiment,
        entities: enrichment.entities,
        topics: None,
    }
}

fn store_unavailable(err: Error) -> Error {
    match err {
        Error::StoreUnavailable(_) => err,
        other => Error::StoreUnavailable(other.to_string()),
    }
}

/// Remove a committed batch. A leftover file is replayed later and deduplicated by URL.
fn discard(area: &StagingArea, path: &Path) {
    if let Err(e) = area.remove(path) {
        tracing::warn!(path = %path.display(), error = %e, "Could not remove committed batch");
    }
}

fn quarantine(area: &StagingArea, path: &Path) {
    match area.quarantine(path) {
        Ok(moved) => tracing::warn!(path = %moved.display(), "Quarantined staged batch"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not quarantine staged batch"),
    }
}

/// Resolves once shutdown is requested; never if the sender is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
