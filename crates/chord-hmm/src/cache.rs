use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::corpus::CorpusModel;

/// SQLite-backed cache of built corpus models.
///
/// Cache key is `(fingerprint, version)`. A changed corpus hashes to a new
/// fingerprint, and a bumped model version misses, so stale models are
/// rebuilt on next access.
pub struct ModelCache {
    connection: Mutex<Connection>,
}

impl ModelCache {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating cache directory {}", parent.display()))?;
        }

        let connection = Connection::open(db_path).context("opening model cache db")?;

        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS corpus_model (
                    fingerprint  TEXT NOT NULL,
                    version      INTEGER NOT NULL,
                    created_at   TEXT NOT NULL,
                    model_json   TEXT NOT NULL,
                    PRIMARY KEY (fingerprint, version)
                );",
            )
            .context("creating cache tables")?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Look up a model for the given fingerprint and version.
    pub fn get(&self, fingerprint: &str, version: u32) -> Result<Option<CorpusModel>> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| anyhow::anyhow!("cache mutex poisoned"))?;

        let mut stmt = conn.prepare_cached(
            "SELECT model_json FROM corpus_model WHERE fingerprint = ?1 AND version = ?2",
        )?;

        let result = stmt.query_row(rusqlite::params![fingerprint, version], |row| {
            let json: String = row.get(0)?;
            Ok(json)
        });

        match result {
            Ok(json) => {
                let model: CorpusModel =
                    serde_json::from_str(&json).context("deserializing cached model")?;
                model.validate().context("cached model failed validation")?;
                Ok(Some(model))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).context("querying model cache"),
        }
    }

    /// Most recently stored model of `version`, whatever corpus it came
    /// from. Lets inference run without re-reading the corpus.
    pub fn latest(&self, version: u32) -> Result<Option<CorpusModel>> {
        let fingerprint: Option<String> = {
            let conn = self
                .connection
                .lock()
                .map_err(|_| anyhow::anyhow!("cache mutex poisoned"))?;
            let mut stmt = conn.prepare_cached(
                "SELECT fingerprint FROM corpus_model WHERE version = ?1
                 ORDER BY created_at DESC LIMIT 1",
            )?;
            match stmt.query_row(rusqlite::params![version], |row| row.get(0)) {
                Ok(fp) => Some(fp),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e).context("querying model cache"),
            }
        };

        match fingerprint {
            Some(fp) => self.get(&fp, version),
            None => Ok(None),
        }
    }

    /// Store a built model.
    pub fn put(&self, model: &CorpusModel) -> Result<()> {
        let json = serde_json::to_string(model).context("serializing model for cache")?;
        let now = chrono::Utc::now().to_rfc3339();

        let conn = self
            .connection
            .lock()
            .map_err(|_| anyhow::anyhow!("cache mutex poisoned"))?;

        conn.execute(
            "INSERT OR REPLACE INTO corpus_model (fingerprint, version, created_at, model_json)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![model.fingerprint, model.version, now, json],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Annotation, CorpusBuilder, Song};
    use crate::pitch_table::PitchTable;
    use tempfile::TempDir;

    fn sample_model() -> CorpusModel {
        let song = Song::new(
            1,
            vec![
                Annotation::new(0.0, 2.0, "C:maj"),
                Annotation::new(2.0, 4.0, "G:maj"),
                Annotation::new(4.0, 6.0, "A:min"),
            ],
        );
        CorpusBuilder::default().build(&[song], &PitchTable::new()).unwrap()
    }

    #[test]
    fn cache_miss_returns_none() {
        let dir = TempDir::new().unwrap();
        let cache = ModelCache::open(&dir.path().join("test.db")).unwrap();
        assert!(cache.get("nonexistent", 1).unwrap().is_none());
        assert!(cache.latest(1).unwrap().is_none());
    }

    #[test]
    fn cache_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = ModelCache::open(&dir.path().join("test.db")).unwrap();

        let model = sample_model();
        cache.put(&model).unwrap();

        let retrieved = cache.get(&model.fingerprint, model.version).unwrap().unwrap();
        assert_eq!(retrieved.vocabulary, model.vocabulary);
        assert_eq!(retrieved.transitions.rows(), 3);
        assert_eq!(cache.latest(model.version).unwrap().unwrap().fingerprint, model.fingerprint);
    }

    #[test]
    fn version_mismatch_is_cache_miss() {
        let dir = TempDir::new().unwrap();
        let cache = ModelCache::open(&dir.path().join("test.db")).unwrap();

        let model = sample_model();
        cache.put(&model).unwrap();

        // Same fingerprint, different version = miss
        assert!(cache.get(&model.fingerprint, model.version + 1).unwrap().is_none());
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("models.db");
        ModelCache::open(&path).unwrap();
        assert!(path.exists());
    }
}
