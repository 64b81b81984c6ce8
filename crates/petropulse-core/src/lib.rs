pub mod config;
pub mod error;
pub mod extract;
pub mod feed;
pub mod nlp;
pub mod pipeline;
pub mod relevance;
pub mod storage;

pub use config::AppConfig;
pub use error::{Error, Result};
