use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    /// A single feed could not be retrieved or parsed; the run continues
    #[error("Feed unavailable: {url}: {reason}")]
    FeedUnavailable { url: String, reason: String },

    #[error("Timed out after {secs}s: {url}")]
    Timeout { url: String, secs: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The persistence layer cannot be reached. Fatal for a run.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Enrichment backend error: {0}")]
    Enrichment(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
