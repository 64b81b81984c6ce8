//! Full-text article extraction.
//!
//! An [`ArticleExtractor`] tries an ordered list of strategies and keeps the first
//! non-empty result. Failures never leave this module: the caller always gets a
//! string, possibly empty, plus an [`ExtractionOutcome`] for logging.

mod dom;
mod raw;
mod rendered;

pub use dom::{extract_main_text, DomArticleStrategy};
pub use raw::{truncate_chars, RawHtmlStrategy};
pub use rendered::{clean_rendered_text, RenderedTextStrategy};

use std::time::Duration;

use reqwest::header::USER_AGENT;
use reqwest::Client;

use crate::config::ExtractConfig;
use crate::{Error, Result};

const MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;

/// One way of turning an article URL into body text
#[async_trait::async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Download and extract the article body
    async fn extract(&self, url: &str) -> Result<String>;
}

/// How an extraction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Extracted { strategy: &'static str },
    /// At least one strategy ran cleanly but none produced text
    Empty,
    /// Every strategy errored
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub outcome: ExtractionOutcome,
}

impl Extraction {
    fn empty(outcome: ExtractionOutcome) -> Self {
        Self {
            text: String::new(),
            outcome,
        }
    }
}

/// Ordered strategy chain, first non-empty result wins
pub struct ArticleExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl ArticleExtractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// The default chain: DOM heuristics, rendered text, then raw HTML prefix
    pub fn from_config(config: &ExtractConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = build_client(timeout)?;

        Ok(Self::new(vec![
            Box::new(DomArticleStrategy::new(client.clone(), &config.user_agent)),
            Box::new(RenderedTextStrategy::new(timeout)?),
            Box::new(RawHtmlStrategy::new(
                client,
                &config.user_agent,
                config.raw_fallback_chars,
            )),
        ]))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Best-effort body text for `url`
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn extract(&self, url: &str) -> Extraction {
        let mut any_clean = false;

        for strategy in &self.strategies {
            match strategy.extract(url).await {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::debug!(strategy = strategy.name(), chars = text.len(), "Extracted article");
                    return Extraction {
                        text,
                        outcome: ExtractionOutcome::Extracted {
                            strategy: strategy.name(),
                        },
                    };
                }
                Ok(_) => {
                    any_clean = true;
                    tracing::debug!(strategy = strategy.name(), "Strategy produced no text");
                }
                Err(e) => {
                    tracing::debug!(strategy = strategy.name(), error = %e, "Strategy failed");
                }
            }
        }

        if any_clean {
            tracing::info!(url, "No article text extracted");
            Extraction::empty(ExtractionOutcome::Empty)
        } else {
            tracing::warn!(url, "All extraction strategies failed");
            Extraction::empty(ExtractionOutcome::Failed)
        }
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .gzip(true)
        .deflate(true)
        .brotli(true)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(Error::Http)
}

/// GET a page and return its body as text
pub(crate) async fn fetch_page(client: &Client, url: &str, user_agent: &str) -> Result<String> {
    let response = client.get(url).header(USER_AGENT, user_agent).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Extraction(format!("HTTP {} for URL: {}", status, url)));
    }

    let bytes = response.bytes().await?;
    if bytes.len() > MAX_PAGE_BYTES {
        return Err(Error::Extraction(format!(
            "Page too large ({} bytes) for URL: {}",
            bytes.len(),
            url
        )));
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
