use chrono::{DateTime, Utc};
use feed_rs::parser;
use url::Url;

use super::dates::{parse_free_text_date, scan_item_dates};
use super::models::RawEntry;
use crate::{Error, Result};

/// Parsed feed data from RSS/Atom content
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub source_name: String,
    pub entries: Vec<RawEntry>,
}

/// Parse RSS/Atom content into at most `limit` raw entries.
///
/// `now` is the fallback publication time for entries without a usable date.
pub fn parse_feed(
    content: &[u8],
    feed_url: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<ParsedFeed> {
    let feed = parser::parse(content).map_err(|e| Error::FeedParse(e.to_string()))?;

    let source_name = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| source_name_from_url(feed_url));

    // Only trust positional alignment when both passes saw the same items
    let raw_dates = scan_item_dates(content);
    let raw_dates = (raw_dates.len() == feed.entries.len()).then_some(raw_dates);

    let entries = feed
        .entries
        .into_iter()
        .enumerate()
        .take(limit)
        .map(|(index, entry)| {
            let url = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))
                .unwrap_or_default();

            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .unwrap_or_default();

            let summary = entry
                .summary
                .map(|s| s.content)
                .filter(|s| !s.trim().is_empty())
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|html| html_to_text(&html))
                .unwrap_or_default();

            let published_at = entry
                .published
                .or(entry.updated)
                .or_else(|| {
                    raw_dates
                        .as_ref()
                        .and_then(|dates| dates[index].best())
                        .and_then(parse_free_text_date)
                })
                .unwrap_or(now);

            RawEntry {
                source_name: source_name.clone(),
                title,
                url,
                published_at,
                summary,
            }
        })
        .collect();

    Ok(ParsedFeed {
        source_name,
        entries,
    })
}

/// Human-readable source name from a feed URL's domain
pub fn source_name_from_url(feed_url: &str) -> String {
    Url::parse(feed_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .map(|host| host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| "Unknown Source".to_string())
}

/// Convert HTML content to plain text
fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 4096).unwrap_or_else(|_| html.to_string());
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
