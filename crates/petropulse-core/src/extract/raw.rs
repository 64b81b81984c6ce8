use reqwest::Client;

use super::{fetch_page, ExtractionStrategy};
use crate::Result;

/// Last resort: the first `max_chars` characters of the raw HTML
pub struct RawHtmlStrategy {
    client: Client,
    user_agent: String,
    max_chars: usize,
}

impl RawHtmlStrategy {
    pub fn new(client: Client, user_agent: &str, max_chars: usize) -> Self {
        Self {
            client,
            user_agent: user_agent.to_string(),
            max_chars,
        }
    }
}

#[async_trait::async_trait]
impl ExtractionStrategy for RawHtmlStrategy {
    fn name(&self) -> &'static str {
        "raw"
    }

    async fn extract(&self, url: &str) -> Result<String> {
        let html = fetch_page(&self.client, url, &self.user_agent).await?;
        Ok(truncate_chars(&html, self.max_chars).to_string())
    }
}

pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[tokio::test]
    async fn test_raw_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>0123456789</body></html>"))
            .mount(&server)
            .await;

        let strategy = RawHtmlStrategy::new(Client::new(), "test-agent", 12);
        let text = strategy.extract(&server.uri()).await.unwrap();
        assert_eq!(text, "<html><body>");
    }
}
