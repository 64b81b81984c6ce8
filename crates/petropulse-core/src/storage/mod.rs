mod article_repo;
mod database;
mod retry;
mod staging;

pub use article_repo::{ArticleRepository, DailySentiment};
pub use database::Database;
pub use retry::{execute_with_retry, is_transient_error, query_with_retry};
pub use staging::StagingArea;
