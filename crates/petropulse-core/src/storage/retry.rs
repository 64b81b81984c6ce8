//! Retry logic for SQLite operations.
//!
//! Another ingestion run or a dashboard reader can hold the database lock for a
//! moment. Those errors are transient and retried with exponential backoff.

use std::future::Future;
use std::time::Duration;

/// Maximum number of retry attempts for database operations
pub const MAX_RETRIES: u32 = 5;

const BASE_DELAY_MS: u64 = 200;

/// SQLite result codes worth another attempt: BUSY, LOCKED, BUSY_SNAPSHOT and
/// the IOERR family (base, READ, SHORT_READ, WRITE, FSYNC, DIR_FSYNC, LOCK, CLOSE)
const TRANSIENT_CODES: &[&str] = &[
    "5", "6", "1032", "10", "266", "522", "2314", "3338", "4618", "5386", "5642",
];

/// Lock contention and I/O hiccups are transient; constraint violations, a
/// closed pool and decode errors are not.
pub fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|code| TRANSIENT_CODES.iter().any(|c| code == *c))
            .unwrap_or(false),
        // Every pooled connection was held by other readers
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// 200ms, doubling each attempt
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt.saturating_sub(1)))
}

/// Retry a write whose result is discarded
pub async fn execute_with_retry<F, Fut>(operation: F) -> std::result::Result<(), sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<(), sqlx::Error>>,
{
    with_retry("write", operation).await
}

/// Retry a query or a whole transaction, returning its value
pub async fn query_with_retry<F, Fut, T>(operation: F) -> std::result::Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    with_retry("query", operation).await
}

async fn with_retry<F, Fut, T>(kind: &'static str, operation: F) -> std::result::Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Err(e) if is_transient_error(&e) && attempt < MAX_RETRIES => {
                attempt += 1;
                let delay = backoff_delay(attempt);
                tracing::debug!(
                    kind,
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Transient database error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn constraint_error() -> sqlx::Error {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE t (url TEXT UNIQUE)").execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO t VALUES ('a')").execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO t VALUES ('a')").execute(&pool).await.unwrap_err()
    }

    #[tokio::test]
    async fn test_constraint_violation_is_not_transient() {
        assert!(!is_transient_error(&constraint_error().await));
        assert!(!is_transient_error(&sqlx::Error::RowNotFound));
        assert!(!is_transient_error(&sqlx::Error::PoolClosed));
        assert!(is_transient_error(&sqlx::Error::PoolTimedOut));
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result = execute_with_retry(|| {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err(sqlx::Error::RowNotFound) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);

        let value = query_with_retry(|| async { Ok::<_, sqlx::Error>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(1), Duration::from_millis(200));
        assert_eq!(backoff_delay(2), Duration::from_millis(400));
        assert_eq!(backoff_delay(3), Duration::from_millis(800));
        assert_eq!(backoff_delay(4), Duration::from_millis(1600));
        assert_eq!(backoff_delay(5), Duration::from_millis(3200));
    }
}
