//! Publication date recovery.
//!
//! feed-rs only yields structured timestamps it managed to parse. Newsroom feeds
//! often carry dates it rejects ("May 1, 2024", "2024-05-01 10:00:00 EST"), so the
//! raw date text of every item is scanned separately and parsed leniently here.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Element local names holding a publication date, in preference order
const PUBLISHED_TAGS: &[&[u8]] = &[b"pubDate", b"published", b"issued", b"date"];
const UPDATED_TAGS: &[&[u8]] = &[b"updated", b"modified", b"lastBuildDate"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %B %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
    "%A, %d %B %Y %H:%M:%S",
    "%b %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%a, %d %b %Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
];

/// Raw date strings per item/entry, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItemDate {
    pub published: Option<String>,
    pub updated: Option<String>,
}

impl RawItemDate {
    pub fn best(&self) -> Option<&str> {
        self.published.as_deref().or(self.updated.as_deref())
    }
}

/// Scan a feed document for the raw date text of each `<item>` / `<entry>`.
///
/// Returns one element per item in document order, which is also the order feed-rs
/// yields entries in. A document that is not XML yields an empty list.
pub fn scan_item_dates(content: &[u8]) -> Vec<RawItemDate> {
    let text = String::from_utf8_lossy(content);
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<RawItemDate> = None;
    let mut capture: Option<DateSlot> = None;
    let mut buffer = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name == b"item" || name == b"entry" {
                    current = Some(RawItemDate::default());
                } else if current.is_some() {
                    capture = slot_for(name);
                    buffer.clear();
                }
            }
            Ok(Event::Text(t)) if capture.is_some() => {
                if let Ok(value) = t.unescape() {
                    buffer.push_str(&value);
                }
            }
            Ok(Event::CData(t)) if capture.is_some() => {
                buffer.push_str(&String::from_utf8_lossy(&t.into_inner()));
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name == b"item" || name == b"entry" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                } else if let (Some(slot), Some(item)) = (capture.take(), current.as_mut()) {
                    let value = buffer.trim().to_string();
                    if !value.is_empty() {
                        let target = match slot {
                            DateSlot::Published => &mut item.published,
                            DateSlot::Updated => &mut item.updated,
                        };
                        if target.is_none() {
                            *target = Some(value);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Stopped raw date scan on malformed XML");
                break;
            }
            _ => {}
        }
    }

    items
}

#[derive(Debug, Clone, Copy)]
enum DateSlot {
    Published,
    Updated,
}

fn slot_for(name: &[u8]) -> Option<DateSlot> {
    if PUBLISHED_TAGS.contains(&name) {
        Some(DateSlot::Published)
    } else if UPDATED_TAGS.contains(&name) {
        Some(DateSlot::Updated)
    } else {
        None
    }
}

/// Parse a free-text date as found in feeds. Naive values are taken as UTC.
pub fn parse_free_text_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let stripped = strip_zone_suffix(raw);

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(stripped, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(stripped, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}

/// Drop a trailing zone abbreviation or offset ("GMT", "EST", "+0000", "Z")
fn strip_zone_suffix(raw: &str) -> &str {
    if let Some((head, tail)) = raw.rsplit_once(' ') {
        let is_abbrev = (1..=5).contains(&tail.len()) && tail.chars().all(|c| c.is_ascii_uppercase());
        let is_offset = tail.len() == 5
            && (tail.starts_with('+') || tail.starts_with('-'))
            && tail[1..].chars().all(|c| c.is_ascii_digit());
        if is_abbrev || is_offset {
            return head.trim_end();
        }
    }
    raw.strip_suffix('Z').unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_rfc2822_and_rfc3339() {
        let dt = parse_free_text_date("Wed, 01 May 2024 10:00:00 +0200").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-05-01T08:00:00+00:00");

        let dt = parse_free_text_date("2024-05-01T10:00:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_parse_newsroom_formats() {
        let cases = [
            "2024-05-01 10:00:00",
            "2024-05-01 10:00:00 EST",
            "01 May 2024 10:00:00",
            "May 1, 2024",
            "2024-05-01",
            "05/01/2024",
        ];
        for case in cases {
            let dt = parse_free_text_date(case).unwrap_or_else(|| panic!("failed: {}", case));
            assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 5, 1), "{}", case);
        }
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse_free_text_date("").is_none());
        assert!(parse_free_text_date("sometime last week").is_none());
    }

    #[test]
    fn test_scan_item_dates_rss_and_atom() {
        let rss = br#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/"><channel>
  <title>T</title>
  <lastBuildDate>Mon, 06 May 2024 00:00:00 GMT</lastBuildDate>
  <item><title>a</title><pubDate>May 1, 2024</pubDate></item>
  <item><title>b</title></item>
  <item><title>c</title><dc:date>2024-05-03</dc:date></item>
</channel></rss>"#;

        let dates = scan_item_dates(rss);
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[0].best(), Some("May 1, 2024"));
        assert_eq!(dates[1].best(), None);
        assert_eq!(dates[2].best(), Some("2024-05-03"));

        let atom = br#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry><title>x</title><updated>2024-05-02 08:00:00</updated></entry>
</feed>"#;
        let dates = scan_item_dates(atom);
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].published, None);
        assert_eq!(dates[0].best(), Some("2024-05-02 08:00:00"));
    }
}
