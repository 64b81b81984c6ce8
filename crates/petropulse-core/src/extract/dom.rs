use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use super::{fetch_page, ExtractionStrategy};
use crate::Result;

/// Containers that usually hold the article body, most specific first
const CONTENT_SELECTORS: &[&str] = &[
    "[itemprop=\"articleBody\"]",
    "article",
    ".article-body, .article-content, .story-body, .entry-content, .post-content, .press-release",
    "main",
    "[role=\"main\"]",
    "body",
];

/// Elements whose text is never article body
const BOILERPLATE_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "form", "figure",
];

const MIN_PARAGRAPH_CHARS: usize = 40;

/// GET the page with a descriptive User-Agent and keep the paragraphs of its main content block
pub struct DomArticleStrategy {
    client: Client,
    user_agent: String,
}

impl DomArticleStrategy {
    pub fn new(client: Client, user_agent: &str) -> Self {
        Self {
            client,
            user_agent: user_agent.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ExtractionStrategy for DomArticleStrategy {
    fn name(&self) -> &'static str {
        "dom"
    }

    async fn extract(&self, url: &str) -> Result<String> {
        let html = fetch_page(&self.client, url, &self.user_agent).await?;
        Ok(extract_main_text(&html))
    }
}

/// Paragraph text of the first content container that has any, or an empty string
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let paragraph = match Selector::parse("p, li") {
        Ok(selector) => selector,
        Err(_) => return String::new(),
    };

    for css in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };

        for container in document.select(&selector) {
            let paragraphs: Vec<String> = container
                .select(&paragraph)
                .filter(|p| !inside_boilerplate(p))
                .map(|p| collapse_whitespace(&p.text().collect::<String>()))
                .filter(|text| text.chars().count() >= MIN_PARAGRAPH_CHARS)
                .collect();

            if !paragraphs.is_empty() {
                return paragraphs.join("\n\n");
            }
        }
    }

    String::new()
}

fn inside_boilerplate(element: &ElementRef<'_>) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .map(|e| BOILERPLATE_TAGS.contains(&e.name()))
            .unwrap_or(false)
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
