use anyhow::Result;

use petropulse_core::{
    storage::{ArticleRepository, Database},
    AppConfig,
};

pub async fn run(config: &AppConfig) -> Result<()> {
    let db = Database::new(config).await?;
    let days = ArticleRepository::new(&db).daily_sentiment().await?;

    if days.is_empty() {
        println!("No scored articles yet.");
        return Ok(());
    }

    println!("Daily sentiment index:\n");
    println!("  {:<10}  {:>7}  {:>8}", "day", "mean", "articles");
    for day in days {
        println!("  {:<10}  {:>+7.3}  {:>8}", day.day.to_string(), day.mean, day.articles);
    }

    Ok(())
}
