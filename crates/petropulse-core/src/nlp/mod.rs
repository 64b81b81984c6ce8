//! Enrichment services: entity extraction and sentiment scoring.
//!
//! Both are built once per process and handed to the pipeline. Each wraps an
//! optional backend; a missing backend degrades to empty entities / `None`
//! sentiment instead of failing ingestion.

mod entities;
mod sentiment;

pub use entities::{
    EntityExtractor, EntityLabel, EntityMention, EntityRecognizer, GazetteerRecognizer,
};
pub use sentiment::{LexiconSentiment, SentimentModel, SentimentScorer};

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EnrichConfig;
use crate::Result;

/// Organization and place mentions, stored as `{"org": [...], "gpe": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub org: Vec<String>,
    #[serde(default)]
    pub gpe: Vec<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.org.is_empty() && self.gpe.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Keep the first spelling of each value, compared case-insensitively
pub fn unique_case_insensitive<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.to_lowercase()))
        .collect()
}

/// Enrichment result for one article
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub entities: Entities,
    pub sentiment: Option<f64>,
}

/// Entity extraction plus sentiment scoring, shared across workers
pub struct Enricher {
    pub entities: EntityExtractor,
    pub sentiment: SentimentScorer,
}

impl Enricher {
    pub fn new(entities: EntityExtractor, sentiment: SentimentScorer) -> Self {
        Self {
            entities,
            sentiment,
        }
    }

    /// Built-in backends, with the configured gazetteer merged in.
    ///
    /// A gazetteer file that cannot be read is logged and skipped.
    pub fn from_config(config: &EnrichConfig) -> Result<Self> {
        let recognizer = match &config.gazetteer_path {
            Some(path) => match GazetteerRecognizer::with_file(path) {
                Ok(recognizer) => recognizer,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring gazetteer file");
                    GazetteerRecognizer::builtin()?
                }
            },
            None => GazetteerRecognizer::builtin()?,
        };

        Ok(Self::new(
            EntityExtractor::new(Arc::new(recognizer)),
            SentimentScorer::new(Arc::new(LexiconSentiment::new())),
        ))
    }

    /// No backends loaded; every article gets empty entities and no score
    pub fn unavailable() -> Self {
        Self::new(EntityExtractor::unavailable(), SentimentScorer::unavailable())
    }

    pub fn enrich(&self, title: &str, text: &str) -> Enrichment {
        Enrichment {
            entities: self.entities.extract(text, title),
            sentiment: self.sentiment.score(text),
        }
    }
}
