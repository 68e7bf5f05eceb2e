use aide_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::task::ScheduledTask;

const STORE_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct TaskFile {
    version: u32,
    #[serde(default)]
    tasks: Vec<ScheduledTask>,
}

#[derive(Debug, Serialize)]
struct TaskFileRef<'a> {
    version: u32,
    tasks: &'a [ScheduledTask],
}

/// Whole-file task list. Every change rewrites the file.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty list. A file that does not parse is an error.
    pub async fn load(&self) -> Result<Vec<ScheduledTask>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let file: TaskFile = serde_json::from_str(&content).map_err(|e| {
            Error::Storage(format!("malformed task file {}: {}", self.path.display(), e))
        })?;
        if file.version != STORE_VERSION {
            return Err(Error::Storage(format!(
                "unsupported task file version {} in {}",
                file.version,
                self.path.display()
            )));
        }

        debug!(count = file.tasks.len(), path = %self.path.display(), "Loaded tasks");
        Ok(file.tasks)
    }

    /// Temp file + rename so a crash mid-write never leaves a truncated list.
    pub async fn save(&self, tasks: &[ScheduledTask]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(&TaskFileRef {
            version: STORE_VERSION,
            tasks,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(count = tasks.len(), path = %self.path.display(), "Saved tasks");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use chrono::{TimeZone, Utc};

    fn store_in(dir: &tempfile::TempDir) -> TaskStore {
        TaskStore::new(dir.path().join("data").join("tasks.json"))
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_then_read_is_field_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();

        let mut done = ScheduledTask::new(1, "ping", now, now);
        done.finish(Err("exit 1".to_string()), now);
        let tasks = vec![
            done,
            ScheduledTask::new(2, "code: print('hi')", now + chrono::Duration::hours(1), now),
        ];
        store.save(&tasks).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, tasks);
        assert_eq!(loaded[0].status, TaskStatus::Error);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        store.save(&[ScheduledTask::new(5, "ping", now, now)]).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["tasks"][0]["fireAt"], "2026-10-18T09:30:00Z");
        assert_eq!(value["tasks"][0]["status"], "pending");
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{\"version\": 1, \"tasks\": [{\"id\": ").unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, Error::Storage(ref m) if m.contains("malformed")));
    }

    #[tokio::test]
    async fn test_unknown_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{\"version\": 9, \"tasks\": []}").unwrap();

        assert!(store.load().await.is_err());
    }
}
