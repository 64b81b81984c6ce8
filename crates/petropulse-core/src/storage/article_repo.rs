use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use std::collections::HashSet;

use super::retry::query_with_retry;
use super::Database;
use crate::feed::{EnrichedArticle, StoredArticle};
use crate::nlp::Entities;
use crate::Result;

/// Bound parameters per `IN (...)` lookup, well under SQLite's variable limit
const URL_LOOKUP_CHUNK: usize = 500;

/// Repository for the articles table
pub struct ArticleRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct ArticleRow {
    id: i64,
    source: Option<String>,
    title: Option<String>,
    url: String,
    authors: Option<String>,
    published_at: Option<DateTime<Utc>>,
    text: Option<String>,
    sentiment: Option<f64>,
    entities: Option<String>,
    topics: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl From<ArticleRow> for StoredArticle {
    fn from(row: ArticleRow) -> Self {
        StoredArticle {
            id: row.id,
            source: row.source,
            title: row.title,
            url: row.url,
            authors: row.authors,
            published_at: row.published_at,
            text: row.text,
            sentiment: row.sentiment,
            entities: row
                .entities
                .as_deref()
                .and_then(|raw| Entities::from_json(raw).ok())
                .unwrap_or_default(),
            topics: row.topics,
            created_at: row.created_at,
        }
    }
}

/// Mean sentiment of the articles published on one day
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DailySentiment {
    pub day: NaiveDate,
    pub mean: f64,
    pub articles: i64,
}

/// Owned insert values, cloned per retry attempt
#[derive(Clone)]
struct PendingRow {
    source: String,
    title: String,
    url: String,
    published_at: DateTime<Utc>,
    text: String,
    sentiment: Option<f64>,
    entities: String,
    topics: Option<String>,
}

impl PendingRow {
    fn from_article(article: &EnrichedArticle) -> Result<Self> {
        Ok(Self {
            source: article.source.clone(),
            title: article.title.clone(),
            url: article.url.trim().to_string(),
            published_at: article.published_at,
            text: article.text.clone(),
            sentiment: article.sentiment,
            entities: article.entities.to_json()?,
            topics: article.topics.clone(),
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, source, title, url, authors, published_at, text, \
     sentiment, entities, topics, created_at FROM articles";

impl<'a> ArticleRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert the articles whose URL is not stored yet, returning the number inserted.
    ///
    /// Rows without a URL are dropped, repeated URLs in the batch keep their first
    /// occurrence, and stored URLs are skipped. The UNIQUE constraint still guards
    /// against a concurrent run inserting the same URL in between: such rows are
    /// ignored, not reported as errors.
    pub async fn insert_new(&self, articles: &[EnrichedArticle]) -> Result<u64> {
        let mut seen = HashSet::new();
        let candidates: Vec<&EnrichedArticle> = articles
            .iter()
            .filter(|a| !a.url.trim().is_empty())
            .filter(|a| seen.insert(a.url.trim().to_string()))
            .collect();

        if candidates.is_empty() {
            return Ok(0);
        }

        let urls: Vec<String> = candidates.iter().map(|a| a.url.trim().to_string()).collect();
        let existing = self.existing_urls(&urls).await?;

        let rows = candidates
            .into_iter()
            .filter(|a| !existing.contains(a.url.trim()))
            .map(PendingRow::from_article)
            .collect::<Result<Vec<_>>>()?;

        if rows.is_empty() {
            tracing::debug!(candidates = urls.len(), "Every candidate URL is already stored");
            return Ok(0);
        }

        let pool = self.db.pool().clone();
        let inserted = query_with_retry(|| {
            let pool = pool.clone();
            let rows = rows.clone();
            async move {
                let mut tx = pool.begin().await?;
                let mut inserted = 0u64;
                for row in &rows {
                    let result = sqlx::query(
                        r#"
                        INSERT OR IGNORE INTO articles
                        (source, title, url, published_at, text, sentiment, entities, topics)
                        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(&row.source)
                    .bind(&row.title)
                    .bind(&row.url)
                    .bind(row.published_at)
                    .bind(&row.text)
                    .bind(row.sentiment)
                    .bind(&row.entities)
                    .bind(&row.topics)
                    .execute(&mut *tx)
                    .await?;
                    inserted += result.rows_affected();
                }
                tx.commit().await?;
                Ok::<u64, sqlx::Error>(inserted)
            }
        })
        .await?;

        let raced = rows.len() as u64 - inserted;
        if raced > 0 {
            tracing::info!(raced, "URLs inserted concurrently by another writer were skipped");
        }

        Ok(inserted)
    }

    /// The subset of `urls` already present in the store
    pub async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>> {
        let mut existing = HashSet::new();

        for chunk in urls.chunks(URL_LOOKUP_CHUNK) {
            let placeholders: Vec<&str> = chunk.iter().map(|_| "?").collect();
            let query = format!(
                "SELECT url FROM articles WHERE url IN ({})",
                placeholders.join(", ")
            );

            let pool = self.db.pool().clone();
            let found: Vec<String> = query_with_retry(|| {
                let pool = pool.clone();
                let query = query.clone();
                async move {
                    let mut builder = sqlx::query_scalar::<_, String>(&query);
                    for url in chunk {
                        builder = builder.bind(url);
                    }
                    builder.fetch_all(&pool).await
                }
            })
            .await?;

            existing.extend(found);
        }

        Ok(existing)
    }

    /// Every stored row, oldest first
    pub async fn fetch_all(&self) -> Result<Vec<StoredArticle>> {
        let pool = self.db.pool().clone();
        let query = format!("{} ORDER BY id", SELECT_COLUMNS);

        let rows: Vec<ArticleRow> = query_with_retry(|| {
            let pool = pool.clone();
            let query = query.clone();
            async move { sqlx::query_as(&query).fetch_all(&pool).await }
        })
        .await?;

        Ok(rows.into_iter().map(StoredArticle::from).collect())
    }

    /// Most recently published rows
    pub async fn recent(&self, limit: u32) -> Result<Vec<StoredArticle>> {
        let pool = self.db.pool().clone();
        let query = format!(
            "{} ORDER BY published_at DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        );

        let rows: Vec<ArticleRow> = query_with_retry(|| {
            let pool = pool.clone();
            let query = query.clone();
            async move {
                sqlx::query_as(&query)
                    .bind(limit as i64)
                    .fetch_all(&pool)
                    .await
            }
        })
        .await?;

        Ok(rows.into_iter().map(StoredArticle::from).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let pool = self.db.pool().clone();
        let count: i64 = query_with_retry(|| {
            let pool = pool.clone();
            async move {
                sqlx::query_scalar("SELECT COUNT(*) FROM articles")
                    .fetch_one(&pool)
                    .await
            }
        })
        .await?;
        Ok(count)
    }

    /// Row count per source, largest first
    pub async fn source_counts(&self) -> Result<Vec<(String, i64)>> {
        let pool = self.db.pool().clone();
        let rows: Vec<(String, i64)> = query_with_retry(|| {
            let pool = pool.clone();
            async move {
                sqlx::query_as(
                    r#"
                    SELECT COALESCE(source, 'Unknown Source') AS name, COUNT(*) AS n
                    FROM articles
                    GROUP BY name
                    ORDER BY n DESC, name ASC
                    "#,
                )
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        Ok(rows)
    }

    /// Mean sentiment per publication day, ignoring unscored rows
    pub async fn daily_sentiment(&self) -> Result<Vec<DailySentiment>> {
        let pool = self.db.pool().clone();
        let rows: Vec<(String, f64, i64)> = query_with_retry(|| {
            let pool = pool.clone();
            async move {
                sqlx::query_as(
                    r#"
                    SELECT substr(published_at, 1, 10) AS day, AVG(sentiment), COUNT(sentiment)
                    FROM articles
                    WHERE sentiment IS NOT NULL AND published_at IS NOT NULL
                    GROUP BY day
                    ORDER BY day
                    "#,
                )
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(day, mean, articles)| {
                NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                    .ok()
                    .map(|day| DailySentiment { day, mean, articles })
            })
            .collect())
    }
}
