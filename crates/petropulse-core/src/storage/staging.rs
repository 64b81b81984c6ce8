//! Durable staging of enriched batches.
//!
//! A batch is written here as JSON lines before it touches the database and
//! removed once inserted. Batches left behind by a store outage or a crash are
//! replayed on the next commit.

use chrono::Utc;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::feed::EnrichedArticle;
use crate::Result;

const BATCH_PREFIX: &str = "batch-";
const BATCH_EXTENSION: &str = "jsonl";
const QUARANTINE_EXTENSION: &str = "bad";

pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a batch, returning its file. An empty batch writes nothing.
    pub fn stage(&self, articles: &[EnrichedArticle]) -> Result<Option<PathBuf>> {
        if articles.is_empty() {
            return Ok(None);
        }
        fs::create_dir_all(&self.dir)?;

        let name = format!(
            "{}{}-{}",
            BATCH_PREFIX,
            Utc::now().format("%Y%m%dT%H%M%S%9fZ"),
            uuid::Uuid::new_v4()
        );
        let tmp_path = self.dir.join(format!("{}.tmp", name));
        let path = self.dir.join(format!("{}.{}", name, BATCH_EXTENSION));

        {
            let mut file = fs::File::create(&tmp_path)?;
            for article in articles {
                serde_json::to_writer(&mut file, article)?;
                file.write_all(b"\n")?;
            }
            file.sync_all()?;
        }
        // Readers only ever see complete batches
        fs::rename(&tmp_path, &path)?;

        tracing::debug!(path = %path.display(), articles = articles.len(), "Staged batch");
        Ok(Some(path))
    }

    /// Staged batch files, oldest first
    pub fn pending(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut batches: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_batch_file(path))
            .collect();
        batches.sort();
        Ok(batches)
    }

    /// Read a staged batch. Lines that no longer deserialize are logged and skipped.
    pub fn load(&self, path: &Path) -> Result<Vec<EnrichedArticle>> {
        let reader = BufReader::new(fs::File::open(path)?);
        let mut articles = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EnrichedArticle>(&line) {
                Ok(article) => articles.push(article),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping unreadable staged article"
                    );
                }
            }
        }

        Ok(articles)
    }

    pub fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    /// Move an unreadable batch aside so it is no longer pending
    pub fn quarantine(&self, path: &Path) -> Result<PathBuf> {
        let target = path.with_extension(QUARANTINE_EXTENSION);
        fs::rename(path, &target)?;
        Ok(target)
    }
}

fn is_batch_file(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(BATCH_PREFIX))
        .unwrap_or(false);
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e == BATCH_EXTENSION)
        .unwrap_or(false);
    name_ok && ext_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::Entities;

    fn temp_area() -> StagingArea {
        StagingArea::new(
            std::env::temp_dir().join(format!("petropulse-staging-{}", uuid::Uuid::new_v4())),
        )
    }

    fn article(url: &str) -> EnrichedArticle {
        EnrichedArticle {
            source: "Wire".to_string(),
            title: "LNG cargo".to_string(),
            url: url.to_string(),
            published_at: Utc::now(),
            text: String::new(),
            sentiment: None,
            entities: Entities::default(),
            topics: None,
        }
    }

    #[test]
    fn test_stage_load_remove() {
        let area = temp_area();
        assert!(area.pending().unwrap().is_empty());
        assert!(area.stage(&[]).unwrap().is_none());

        let first = area.stage(&[article("https://a.test/1"), article("https://a.test/2")]).unwrap().unwrap();
        let second = area.stage(&[article("https://a.test/3")]).unwrap().unwrap();

        let pending = area.pending().unwrap();
        assert_eq!(pending, vec![first.clone(), second.clone()]);

        let loaded = area.load(&first).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].url, "https://a.test/2");
        assert_eq!(loaded[0].sentiment, None);

        area.remove(&first).unwrap();
        assert_eq!(area.pending().unwrap(), vec![second]);

        fs::remove_dir_all(area.dir()).ok();
    }

    #[test]
    fn test_load_skips_corrupt_lines_and_ignores_other_files() {
        let area = temp_area();
        let path = area.stage(&[article("https://a.test/1")]).unwrap().unwrap();

        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("{not json\n");
        fs::write(&path, content).unwrap();
        fs::write(area.dir().join("notes.txt"), "x").unwrap();
        fs::write(area.dir().join("batch-partial.tmp"), "x").unwrap();

        assert_eq!(area.load(&path).unwrap().len(), 1);
        assert_eq!(area.pending().unwrap(), vec![path]);

        fs::remove_dir_all(area.dir()).ok();
    }

    #[test]
    fn test_quarantine_takes_batch_out_of_pending() {
        let area = temp_area();
        let path = area.stage(&[article("https://a.test/1")]).unwrap().unwrap();

        let moved = area.quarantine(&path).unwrap();
        assert!(moved.exists());
        assert_eq!(moved.extension().and_then(|e| e.to_str()), Some("bad"));
        assert!(area.pending().unwrap().is_empty());

        fs::remove_dir_all(area.dir()).ok();
    }
}
