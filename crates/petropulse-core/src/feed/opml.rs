use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::Result;

/// A feed outline read from an OPML file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpmlFeed {
    pub url: String,
    pub name: Option<String>,
    /// Text of the enclosing category outline, if any
    pub group: Option<String>,
}

pub fn parse_opml_file(path: &Path) -> Result<Vec<OpmlFeed>> {
    let content = std::fs::read_to_string(path)?;
    parse_opml(&content)
}

pub fn parse_opml(content: &str) -> Result<Vec<OpmlFeed>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();
    // Category outlines currently open; `None` marks an open outline that is itself a feed
    let mut groups: Vec<Option<String>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                let outline = read_outline(&e);
                match outline.url {
                    Some(url) => {
                        feeds.push(OpmlFeed {
                            url,
                            name: outline.name,
                            group: current_group(&groups),
                        });
                        groups.push(None);
                    }
                    None => groups.push(outline.name),
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                let outline = read_outline(&e);
                // Only add if xmlUrl exists (actual feed, not category)
                if let Some(url) = outline.url {
                    feeds.push(OpmlFeed {
                        url,
                        name: outline.name,
                        group: current_group(&groups),
                    });
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                groups.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(crate::Error::FeedParse(format!("Failed to parse OPML: {}", e)));
            }
            _ => {}
        }
    }

    Ok(feeds)
}

struct Outline {
    url: Option<String>,
    name: Option<String>,
}

fn read_outline(e: &quick_xml::events::BytesStart<'_>) -> Outline {
    let mut url = None;
    let mut title = None;
    let mut text = None;

    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).trim().to_string();
        if value.is_empty() {
            continue;
        }
        match attr.key.as_ref() {
            b"xmlUrl" => url = Some(value),
            b"title" => title = Some(value),
            b"text" => text = Some(value),
            _ => {}
        }
    }

    Outline {
        url,
        name: title.or(text),
    }
}

fn current_group(groups: &[Option<String>]) -> Option<String> {
    groups.iter().rev().find_map(|g| g.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_opml_with_groups() {
        let opml = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <head><title>Energy</title></head>
  <body>
    <outline text="Upstream">
      <outline text="Rigs" title="Rig News" xmlUrl="https://example.com/rigs.xml" type="rss"/>
      <outline text="Seismic" xmlUrl="https://example.com/seismic.xml" type="rss"/>
    </outline>
    <outline text="Direct" xmlUrl="https://example.com/direct.xml" type="rss"/>
  </body>
</opml>"#;

        let feeds = parse_opml(opml).unwrap();
        assert_eq!(feeds.len(), 3);
        assert_eq!(feeds[0].name.as_deref(), Some("Rig News"));
        assert_eq!(feeds[0].group.as_deref(), Some("Upstream"));
        assert_eq!(feeds[1].name.as_deref(), Some("Seismic"));
        assert_eq!(feeds[2].url, "https://example.com/direct.xml");
        assert_eq!(feeds[2].group, None);
    }

    #[test]
    fn test_parse_opml_skips_category_only_outlines() {
        let opml = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <body>
    <outline text="Empty Category"/>
    <outline text="Blank url" xmlUrl=""/>
  </body>
</opml>"#;

        let feeds = parse_opml(opml).unwrap();
        assert!(feeds.is_empty());
    }

    #[test]
    fn test_parse_opml_malformed() {
        let result = parse_opml("<opml><body><outline text=\"x\" xmlUrl=\"u\"></body>");
        assert!(result.is_err());
    }
}
