use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Max items taken from each feed
    #[serde(default = "default_per_feed_limit")]
    pub per_feed_limit: usize,
    /// Only keep items published within the last N days
    #[serde(default = "default_days")]
    pub days: u32,
    /// Feeds fetched in parallel
    #[serde(default = "default_feed_concurrency")]
    pub concurrency: usize,
    /// Hard deadline for one feed, retries included
    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,
    /// Timeout for a single HTTP request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// HTTP proxy URL for feed fetching (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
    /// Extra feeds to pull from an OPML file
    #[serde(default)]
    pub opml_path: Option<PathBuf>,
    /// Restrict the run to these registry categories (kebab-case names)
    #[serde(default)]
    pub categories: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            per_feed_limit: default_per_feed_limit(),
            days: default_days(),
            concurrency: default_feed_concurrency(),
            feed_timeout_secs: default_feed_timeout(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            proxy_url: None,
            opml_path: None,
            categories: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Article pages downloaded in parallel
    #[serde(default = "default_extract_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
    /// Characters of raw HTML kept by the last-resort strategy
    #[serde(default = "default_raw_fallback_chars")]
    pub raw_fallback_chars: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            concurrency: default_extract_concurrency(),
            timeout_secs: default_request_timeout(),
            raw_fallback_chars: default_raw_fallback_chars(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Enrichment workers (0 = number of available cores)
    #[serde(default)]
    pub concurrency: usize,
    /// JSON file `{"org": [...], "gpe": [...]}` merged into the built-in gazetteer
    #[serde(default)]
    pub gazetteer_path: Option<PathBuf>,
    /// Terms appended to the relevance vocabulary
    #[serde(default)]
    pub extra_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Overrides `<data_dir>/insights.sqlite`
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Write enriched batches to the staging directory before inserting
    #[serde(default = "default_true")]
    pub staging: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            staging: default_true(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between ingestion runs in daemon mode (0 = disabled)
    #[serde(default)]
    pub interval_secs: u64,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("petropulse")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_per_feed_limit() -> usize {
    30
}

fn default_days() -> u32 {
    30
}

fn default_feed_concurrency() -> usize {
    8
}

fn default_feed_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_extract_concurrency() -> usize {
    4
}

fn default_raw_fallback_chars() -> usize {
    5000
}

fn default_user_agent() -> String {
    "PetroPulse/1.0 (+https://example.com)".to_string()
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from the default location or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit file, falling back to defaults if it is absent
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Get the configuration file path
    /// Always uses ~/.config/petropulse/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("petropulse")
            .join("config.toml")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        match &self.storage.database_path {
            Some(path) => expand_tilde(path),
            None => self.data_dir().join("insights.sqlite"),
        }
    }

    /// Directory holding enriched batches that have not reached the store yet
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir().join("staging")
    }

    /// Number of enrichment workers, resolving 0 to the core count
    pub fn enrich_workers(&self) -> usize {
        match self.enrich.concurrency {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.fetch.per_feed_limit, 30);
        assert_eq!(config.fetch.days, 30);
        assert_eq!(config.extract.raw_fallback_chars, 5000);
        assert!(config.storage.staging);
        assert_eq!(config.schedule.interval_secs, 0);
    }

    #[test]
    fn test_partial_section_override() {
        let config = AppConfig::from_toml(
            r#"
            [fetch]
            concurrency = 2
            categories = ["major-wires"]

            [storage]
            database_path = "/tmp/pp.sqlite"
            "#,
        )
        .unwrap();

        assert_eq!(config.fetch.concurrency, 2);
        assert_eq!(config.fetch.per_feed_limit, 30);
        assert_eq!(config.fetch.categories, vec!["major-wires".to_string()]);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/pp.sqlite"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml("[fetch\nconcurrency = ").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_enrich_workers_resolves_zero() {
        let mut config = AppConfig::default();
        assert!(config.enrich_workers() >= 1);
        config.enrich.concurrency = 3;
        assert_eq!(config.enrich_workers(), 3);
    }

    #[test]
    fn test_database_path_defaults_under_data_dir() {
        let mut config = AppConfig::default();
        config.general.data_dir = PathBuf::from("/var/lib/petropulse");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/petropulse/insights.sqlite")
        );
        assert_eq!(
            config.staging_dir(),
            PathBuf::from("/var/lib/petropulse/staging")
        );
    }
}
