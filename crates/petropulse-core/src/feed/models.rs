use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::nlp::Entities;

/// Registry grouping of a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedCategory {
    GovernmentData,
    MajorWires,
    IndustryCore,
    LngShipping,
    UtilitiesRenewables,
    CompanySupermajors,
    CompanyNoc,
    CompanyMidstreamLng,
    CompanyOfsEpc,
    CompanyApacAus,
    CompanyEuIndependents,
    /// Feeds imported from OPML
    Custom,
}

impl FeedCategory {
    pub const ALL: [FeedCategory; 12] = [
        FeedCategory::GovernmentData,
        FeedCategory::MajorWires,
        FeedCategory::IndustryCore,
        FeedCategory::LngShipping,
        FeedCategory::UtilitiesRenewables,
        FeedCategory::CompanySupermajors,
        FeedCategory::CompanyNoc,
        FeedCategory::CompanyMidstreamLng,
        FeedCategory::CompanyOfsEpc,
        FeedCategory::CompanyApacAus,
        FeedCategory::CompanyEuIndependents,
        FeedCategory::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedCategory::GovernmentData => "government-data",
            FeedCategory::MajorWires => "major-wires",
            FeedCategory::IndustryCore => "industry-core",
            FeedCategory::LngShipping => "lng-shipping",
            FeedCategory::UtilitiesRenewables => "utilities-renewables",
            FeedCategory::CompanySupermajors => "company-supermajors",
            FeedCategory::CompanyNoc => "company-noc",
            FeedCategory::CompanyMidstreamLng => "company-midstream-lng",
            FeedCategory::CompanyOfsEpc => "company-ofs-epc",
            FeedCategory::CompanyApacAus => "company-apac-aus",
            FeedCategory::CompanyEuIndependents => "company-eu-independents",
            FeedCategory::Custom => "custom",
        }
    }
}

impl fmt::Display for FeedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        FeedCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| crate::Error::Config(format!("Unknown feed category: {}", s)))
    }
}

/// A feed in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub category: FeedCategory,
    pub url: String,
    /// Display name, when the registry entry came with one (OPML `title`/`text`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FeedSource {
    pub fn new(category: FeedCategory, url: impl Into<String>) -> Self {
        Self {
            category,
            url: url.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name.filter(|n| !n.trim().is_empty());
        self
    }
}

/// One feed item as parsed, before body extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    pub source_name: String,
    pub title: String,
    pub url: String,
    /// Always populated; falls back to fetch time when the feed gives no usable date
    pub published_at: DateTime<Utc>,
    pub summary: String,
}

/// The persisted unit, created once per unique URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedArticle {
    pub source: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    /// Full body, empty when extraction failed
    pub text: String,
    /// `None` when there was no text or scoring failed
    pub sentiment: Option<f64>,
    pub entities: Entities,
    pub topics: Option<String>,
}

/// A row read back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub id: i64,
    pub source: Option<String>,
    pub title: Option<String>,
    pub url: String,
    pub authors: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub sentiment: Option<f64>,
    pub entities: Entities,
    pub topics: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_str() {
        for category in FeedCategory::ALL {
            assert_eq!(category.as_str().parse::<FeedCategory>().unwrap(), category);
        }
    }

    #[test]
    fn test_category_parse_accepts_snake_case() {
        assert_eq!(
            "Company_NOC".parse::<FeedCategory>().unwrap(),
            FeedCategory::CompanyNoc
        );
        assert!("pipelines".parse::<FeedCategory>().is_err());
    }
}
