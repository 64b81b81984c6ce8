use bytes::Bytes;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use url::Url;

use super::models::{FeedSource, RawEntry};
use super::parser::{parse_feed, ParsedFeed};
use crate::config::AppConfig;
use crate::{Error, Result};

const MAX_FEED_BYTES: usize = 5 * 1024 * 1024;
const INITIAL_RETRY_DELAY_MS: u64 = 500;

// Rotating User-Agent pool - some newsroom CDNs reject non-browser agents
static USER_AGENT_INDEX: AtomicUsize = AtomicUsize::new(0);
const USER_AGENTS: &[&str] = &[
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Firefox on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Safari on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Get the next User-Agent in rotation
pub(crate) fn next_user_agent() -> &'static str {
    let index = USER_AGENT_INDEX.fetch_add(1, Ordering::Relaxed) % USER_AGENTS.len();
    USER_AGENTS[index]
}

/// Feed fetcher with a shared HTTP client
pub struct FeedFetcher {
    client: Client,
    max_retries: u32,
}

/// A feed that was skipped during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFailure {
    pub url: String,
    pub reason: String,
}

/// Result of fetching a batch of feeds
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub entries: Vec<RawEntry>,
    pub failures: Vec<FeedFailure>,
    /// Feeds that returned a document, even an empty one
    pub feeds_ok: usize,
    /// Entries dropped for a missing URL/source or a repeated URL
    pub dropped: usize,
    pub cancelled: bool,
}

/// Knobs for one batch fetch
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub per_feed: usize,
    pub concurrency: usize,
    pub feed_timeout: Duration,
}

impl FetchOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            per_feed: config.fetch.per_feed_limit,
            concurrency: config.fetch.concurrency.max(1),
            feed_timeout: Duration::from_secs(config.fetch.feed_timeout_secs.max(1)),
        }
    }
}

impl FeedFetcher {
    /// Create a new feed fetcher with configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Self::build_client(config.fetch.request_timeout_secs, &config.fetch.proxy_url)?;

        Ok(Self {
            client,
            max_retries: config.fetch.max_retries.max(1),
        })
    }

    /// Build HTTP client with optional proxy
    fn build_client(timeout_secs: u64, proxy_url: &Option<String>) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ref proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for feed fetching");
        }

        builder.build().map_err(Error::Http)
    }

    /// Build browser-like headers for a request
    fn build_headers(user_agent: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/rss+xml,application/atom+xml,application/xml;q=0.9,text/xml;q=0.9,*/*;q=0.8"
            )
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
        if let Ok(ua) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        headers
    }

    /// Fetch with retry and exponential backoff
    async fn fetch_with_retry(&self, url: &str) -> Result<(StatusCode, HeaderMap, Bytes)> {
        let mut last_error = None;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;

        for attempt in 0..self.max_retries {
            let user_agent = next_user_agent();
            let headers = Self::build_headers(user_agent);

            tracing::debug!(url, attempt = attempt + 1, user_agent, "Fetching feed");

            match self.client.get(url).headers(headers).send().await {
                Ok(response) => {
                    let status = response.status();
                    let resp_headers = response.headers().clone();

                    if status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE
                    {
                        tracing::warn!(url, %status, delay_ms, "Feed throttled, retrying");
                        last_error = Some(Error::FeedParse(format!("HTTP {} for URL: {}", status, url)));
                    } else if status == StatusCode::FORBIDDEN && attempt + 1 < self.max_retries {
                        // A different User-Agent often gets past naive bot filters
                        tracing::warn!(url, "Received 403, trying different User-Agent");
                        last_error = Some(Error::FeedParse(format!("HTTP 403 Forbidden for URL: {}", url)));
                    } else {
                        match response.bytes().await {
                            Ok(bytes) => return Ok((status, resp_headers, bytes)),
                            Err(e) => {
                                tracing::warn!(url, error = %e, "Failed to read response body");
                                last_error = Some(Error::Http(e));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(url, attempt = attempt + 1, error = %e, "Feed request failed");
                    last_error = Some(Error::Http(e));
                }
            }

            if attempt + 1 < self.max_retries {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms *= 2;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::FeedParse(format!(
                "Failed to fetch URL after {} retries: {}",
                self.max_retries, url
            ))
        }))
    }

    /// Fetch and parse one feed, keeping at most `limit` entries
    pub async fn fetch(&self, url: &str, limit: usize) -> Result<ParsedFeed> {
        Url::parse(url)?;

        let (status, resp_headers, content) = self.fetch_with_retry(url).await?;

        ensure_content_size(content.len(), url)?;

        if status == StatusCode::FORBIDDEN {
            let is_cloudflare = resp_headers.get("cf-mitigated").is_some()
                || resp_headers
                    .get("server")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.contains("cloudflare"))
                    .unwrap_or(false);

            if is_cloudflare {
                return Err(Error::FeedParse(format!(
                    "Cloudflare protection detected for URL: {}",
                    url
                )));
            }

            return Err(Error::FeedParse(format!("HTTP 403 Forbidden for URL: {}", url)));
        }

        if !status.is_success() {
            return Err(Error::FeedParse(format!("HTTP {} for URL: {}", status, url)));
        }

        if is_cloudflare_challenge(&content) {
            return Err(Error::FeedParse(format!(
                "Cloudflare JavaScript challenge detected for URL: {}",
                url
            )));
        }

        parse_feed(&content, url, limit, Utc::now())
    }

    /// Fetch a single feed under a hard deadline, mapping every failure to `FeedUnavailable`
    pub async fn fetch_with_deadline(
        &self,
        url: &str,
        limit: usize,
        deadline: Duration,
    ) -> Result<ParsedFeed> {
        match tokio::time::timeout(deadline, self.fetch(url, limit)).await {
            Ok(Ok(parsed)) => Ok(parsed),
            Ok(Err(e)) => Err(Error::FeedUnavailable {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::FeedUnavailable {
                url: url.to_string(),
                reason: Error::Timeout {
                    url: url.to_string(),
                    secs: deadline.as_secs(),
                }
                .to_string(),
            }),
        }
    }
}

/// Check if content is a Cloudflare challenge page
fn is_cloudflare_challenge(content: &[u8]) -> bool {
    let check_len = content.len().min(2048);
    let preview = String::from_utf8_lossy(&content[..check_len]);

    preview.contains("Just a moment...")
        || preview.contains("cf-browser-verification")
        || preview.contains("_cf_chl_opt")
        || preview.contains("challenge-platform")
}

fn ensure_content_size(size: usize, url: &str) -> Result<()> {
    if size > MAX_FEED_BYTES {
        return Err(Error::FeedParse(format!(
            "Feed too large ({} bytes) for URL: {}",
            size, url
        )));
    }
    Ok(())
}

/// Fetch every feed with bounded concurrency.
///
/// A failing or hanging feed is recorded in `failures` and never stops the others.
/// Entries keep per-feed order; the order across feeds is completion order.
/// When `shutdown` flips to true, in-flight fetches are aborted and whatever has
/// been collected so far is returned.
pub async fn fetch_entries(
    fetcher: Arc<FeedFetcher>,
    feeds: &[FeedSource],
    options: &FetchOptions,
    mut shutdown: watch::Receiver<bool>,
) -> FetchOutcome {
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut join_set: JoinSet<(String, Result<ParsedFeed>)> = JoinSet::new();

    for feed in feeds {
        let fetcher = Arc::clone(&fetcher);
        let semaphore = Arc::clone(&semaphore);
        let url = feed.url.clone();
        let limit = options.per_feed;
        let deadline = options.feed_timeout;

        join_set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (url.clone(), Err(Error::Other("fetch pool closed".to_string())));
                }
            };
            let result = fetcher.fetch_with_deadline(&url, limit, deadline).await;
            (url, result)
        });
    }

    let mut outcome = FetchOutcome::default();
    let mut collected = Vec::new();

    loop {
        if *shutdown.borrow() {
            tracing::warn!(remaining = join_set.len(), "Feed fetch cancelled");
            join_set.abort_all();
            outcome.cancelled = true;
            break;
        }

        tokio::select! {
            joined = join_set.join_next() => {
                let Some(joined) = joined else { break };
                match joined {
                    Ok((url, Ok(parsed))) => {
                        tracing::info!(
                            feed = %parsed.source_name,
                            url = %url,
                            entries = parsed.entries.len(),
                            "Fetched feed"
                        );
                        outcome.feeds_ok += 1;
                        collected.extend(parsed.entries);
                    }
                    Ok((url, Err(e))) => {
                        tracing::warn!(url = %url, error = %e, "Skipping feed");
                        outcome.failures.push(FeedFailure { url, reason: e.to_string() });
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => {
                        tracing::error!(error = %e, "Feed task panicked");
                        outcome.failures.push(FeedFailure {
                            url: String::new(),
                            reason: format!("Task join error: {}", e),
                        });
                    }
                }
            }
            changed = shutdown.changed() => {
                // A dropped sender can never cancel; stop watching it
                if changed.is_err() {
                    let (_tx, rx) = watch::channel(false);
                    shutdown = rx;
                }
            }
        }
    }

    let before = collected.len();
    outcome.entries = dedupe_entries(collected);
    outcome.dropped = before - outcome.entries.len();
    outcome
}

/// Drop entries without URL or source, then keep the first entry per URL
pub fn dedupe_entries(entries: Vec<RawEntry>) -> Vec<RawEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| !e.url.trim().is_empty() && !e.source_name.trim().is_empty())
        .filter(|e| seen.insert(e.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedCategory;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.fetch.max_retries = 1;
        config.fetch.request_timeout_secs = 5;
        config
    }

    fn rss(title: &str, links: &[&str]) -> String {
        let items: String = links
            .iter()
            .map(|l| format!("<item><title>{l}</title><link>{l}</link></item>"))
            .collect();
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>{title}</title>{items}</channel></rss>"#
        )
    }

    fn entry(source: &str, url: &str) -> RawEntry {
        RawEntry {
            source_name: source.to_string(),
            title: String::new(),
            url: url.to_string(),
            published_at: Utc::now(),
            summary: String::new(),
        }
    }

    #[test]
    fn test_user_agent_rotation() {
        let first = next_user_agent();
        let second = next_user_agent();
        assert_ne!(first, second);
        assert!(USER_AGENTS.contains(&first));
    }

    #[test]
    fn test_cloudflare_challenge_detection() {
        assert!(is_cloudflare_challenge(b"<html><title>Just a moment...</title></html>"));
        assert!(!is_cloudflare_challenge(b"<rss><channel></channel></rss>"));
    }

    #[test]
    fn test_dedupe_entries_first_wins_and_drops_blank() {
        let entries = vec![
            entry("A", "https://x.test/1"),
            entry("B", "https://x.test/1"),
            entry("A", ""),
            entry("", "https://x.test/2"),
            entry("C", "https://x.test/3"),
        ];
        let kept = dedupe_entries(entries);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].source_name, "A");
        assert_eq!(kept[1].url, "https://x.test/3");
    }

    #[tokio::test]
    async fn test_fetch_parses_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss("Wire", &["https://w.test/a"])))
            .mount(&server)
            .await;

        let fetcher = FeedFetcher::new(&test_config()).unwrap();
        let parsed = fetcher.fetch(&format!("{}/feed", server.uri()), 30).await.unwrap();
        assert_eq!(parsed.source_name, "Wire");
        assert_eq!(parsed.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_http_error_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = FeedFetcher::new(&test_config()).unwrap();
        let err = fetcher.fetch(&format!("{}/gone", server.uri()), 30).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_entries_tolerates_bad_and_slow_feeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/good"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss(
                "Good",
                &["https://g.test/1", "https://g.test/2", "https://shared.test/x"],
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/other"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss("Other", &["https://shared.test/x", "https://o.test/1"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("this is not a feed"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss("Slow", &["https://s.test/1"]))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let feeds: Vec<FeedSource> = ["/good", "/other", "/broken", "/slow"]
            .iter()
            .map(|p| FeedSource::new(FeedCategory::Custom, format!("{}{}", server.uri(), p)))
            .collect();

        let options = FetchOptions {
            per_feed: 30,
            concurrency: 2,
            feed_timeout: Duration::from_millis(500),
        };
        let (_tx, rx) = watch::channel(false);
        let fetcher = Arc::new(FeedFetcher::new(&test_config()).unwrap());

        let outcome = fetch_entries(fetcher, &feeds, &options, rx).await;

        assert_eq!(outcome.feeds_ok, 2);
        assert_eq!(outcome.failures.len(), 2);
        assert!(!outcome.cancelled);
        // shared.test/x appears in two feeds and is kept once
        assert_eq!(outcome.entries.len(), 4);
        assert_eq!(outcome.dropped, 1);

        let slow = outcome
            .failures
            .iter()
            .find(|f| f.url.ends_with("/slow"))
            .unwrap();
        assert!(slow.reason.contains("Timed out"));
    }

    #[tokio::test]
    async fn test_fetch_entries_per_feed_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss(
                "Many",
                &["https://m.test/1", "https://m.test/2", "https://m.test/3"],
            )))
            .mount(&server)
            .await;

        let feeds = vec![FeedSource::new(FeedCategory::Custom, format!("{}/f", server.uri()))];
        let options = FetchOptions {
            per_feed: 2,
            concurrency: 1,
            feed_timeout: Duration::from_secs(5),
        };
        let (_tx, rx) = watch::channel(false);
        let fetcher = Arc::new(FeedFetcher::new(&test_config()).unwrap());

        let outcome = fetch_entries(fetcher, &feeds, &options, rx).await;
        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(outcome.entries[0].url, "https://m.test/1");
        assert_eq!(outcome.entries[1].url, "https://m.test/2");
    }

    #[tokio::test]
    async fn test_fetch_entries_cancelled_before_start() {
        let feeds = vec![FeedSource::new(FeedCategory::Custom, "http://127.0.0.1:9/feed")];
        let options = FetchOptions {
            per_feed: 30,
            concurrency: 1,
            feed_timeout: Duration::from_secs(5),
        };
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let fetcher = Arc::new(FeedFetcher::new(&test_config()).unwrap());

        let outcome = fetch_entries(fetcher, &feeds, &options, rx).await;
        assert!(outcome.cancelled);
        assert!(outcome.entries.is_empty());
    }
}
