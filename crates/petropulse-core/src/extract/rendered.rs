use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;

use super::{build_client, fetch_page, ExtractionStrategy};
use crate::feed::next_user_agent;
use crate::Result;

static FOOTNOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\d+\]:\s").expect("valid regex"));
static LINK_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\[\d+\]").expect("valid regex"));

/// Lines with fewer words are menus, bylines or buttons
const MIN_LINE_WORDS: usize = 5;
const RENDER_WIDTH: usize = 10_000;

/// Independent download with its own client and a browser User-Agent, rendered to text by html2text
pub struct RenderedTextStrategy {
    client: Client,
}

impl RenderedTextStrategy {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

#[async_trait::async_trait]
impl ExtractionStrategy for RenderedTextStrategy {
    fn name(&self) -> &'static str {
        "rendered"
    }

    async fn extract(&self, url: &str) -> Result<String> {
        let html = fetch_page(&self.client, url, next_user_agent()).await?;
        let rendered = html2text::from_read(html.as_bytes(), RENDER_WIDTH)
            .map_err(|e| crate::Error::Extraction(e.to_string()))?;
        Ok(clean_rendered_text(&rendered))
    }
}

/// Drop link footnotes, inline link markers, emphasis and short navigation lines
pub fn clean_rendered_text(rendered: &str) -> String {
    rendered
        .lines()
        .map(str::trim)
        .filter(|line| !FOOTNOTE_RE.is_match(line))
        .map(|line| {
            let line = LINK_MARK_RE.replace_all(line, "$1");
            line.replace("**", "")
                .trim_start_matches('#')
                .trim()
                .to_string()
        })
        .filter(|line| line.split_whitespace().count() >= MIN_LINE_WORDS)
        .collect::<Vec<_>>()
        .join("\n")
}
