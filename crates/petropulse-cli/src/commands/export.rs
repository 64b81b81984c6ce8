use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use petropulse_core::{
    storage::{ArticleRepository, Database},
    AppConfig,
};

pub async fn run(config: &AppConfig, output: &Path) -> Result<()> {
    let db = Database::new(config).await?;
    let articles = ArticleRepository::new(&db).fetch_all().await?;

    let file = File::create(output)
        .with_context(|| format!("cannot create {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    for article in &articles {
        serde_json::to_writer(&mut writer, article)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    println!("Exported {} articles to {}", articles.len(), output.display());

    Ok(())
}
