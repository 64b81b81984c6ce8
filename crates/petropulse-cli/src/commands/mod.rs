pub mod daemon;
pub mod export;
pub mod feeds;
pub mod ingest;
pub mod sentiment;
pub mod stats;
