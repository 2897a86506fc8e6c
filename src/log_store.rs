use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::types::ScoringLogEntry;

pub const LOG_FILE_NAME: &str = "ai_scoring_logs.jsonl";

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Sink for the summary records written after each successful scoring.
#[async_trait]
pub trait ScoringLogStore: Send + Sync {
    async fn append(&self, entry: &ScoringLogEntry) -> Result<(), LogStoreError>;
}

/// Appends one JSON object per line to `<dir>/ai_scoring_logs.jsonl`.
#[derive(Debug)]
pub struct JsonlLogStore {
    path: PathBuf,
    // serializes appends from concurrent handlers
    write_lock: Mutex<()>,
}

impl JsonlLogStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(LOG_FILE_NAME),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ScoringLogStore for JsonlLogStore {
    async fn append(&self, entry: &ScoringLogEntry) -> Result<(), LogStoreError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        tracing::debug!(entry_id = %entry.id, path = %self.path.display(), "scoring log entry appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rubric;

    #[tokio::test]
    async fn appends_one_line_per_entry_and_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlLogStore::new(dir.path().join("logs"));

        let first = ScoringLogEntry::new("user-1", "Golden Hour", Rubric::Image, 8.1);
        let second = ScoringLogEntry::new("user-2", "Chapter One", Rubric::Audio, 6.5);
        store.append(&first).await.unwrap();
        store.append(&second).await.unwrap();

        let contents = tokio::fs::read_to_string(store.path()).await.unwrap();
        let entries: Vec<ScoringLogEntry> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(entries, vec![first, second]);
    }
}
