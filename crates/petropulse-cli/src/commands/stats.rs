use anyhow::Result;

use petropulse_core::{
    storage::{ArticleRepository, Database},
    AppConfig,
};

pub async fn run(config: &AppConfig, limit: u32) -> Result<()> {
    let db = Database::new(config).await?;
    let repo = ArticleRepository::new(&db);

    let total = repo.count().await?;
    if total == 0 {
        println!("No articles stored yet.");
        println!("\nTo fetch articles, run:");
        println!("  petropulse ingest");
        return Ok(());
    }

    println!("Articles: {}\n", total);

    println!("By source:");
    for (source, count) in repo.source_counts().await? {
        println!("  {:>6}  {}", count, source);
    }

    println!("\nMost recent:");
    for article in repo.recent(limit).await? {
        let date = article
            .published_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".to_string());
        let sentiment = article
            .sentiment
            .map(|s| format!("{:+.2}", s))
            .unwrap_or_else(|| "  n/a".to_string());
        let title = article.title.as_deref().unwrap_or("(no title)");

        println!("  {}  {}  {}", date, sentiment, title);
        println!("    {}", article.url);
    }

    Ok(())
}
