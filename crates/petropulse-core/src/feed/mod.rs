mod dates;
mod fetcher;
mod models;
mod opml;
mod parser;
mod registry;

pub use dates::parse_free_text_date;
pub(crate) use fetcher::next_user_agent;
pub use fetcher::{dedupe_entries, fetch_entries, FeedFailure, FeedFetcher, FetchOptions, FetchOutcome};
pub use models::{EnrichedArticle, FeedCategory, FeedSource, RawEntry, StoredArticle};
pub use opml::{parse_opml, parse_opml_file, OpmlFeed};
pub use parser::{parse_feed, source_name_from_url, ParsedFeed};
pub use registry::FeedRegistry;
