//! JSON-file backed content store.
//!
//! This module provides [`JsonFileStore`], which keeps all course records in
//! a single JSON document on disk. Every write goes to a temporary file that
//! is then renamed over the original, so a failed write never leaves a
//! partially updated document behind.
//!
//! The file is the source of truth: every operation reads it afresh, and
//! every write re-reads it under the store's write lock before applying the
//! change. Another process (for example the CLI) writing between two saves
//! therefore never has its update overwritten by stale records.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::memory::{insert_into, owned_by, update_in};
use crate::{ContentStore, CourseContent, CourseRecord, NewCourse, Result, StoreError};

/// A [`ContentStore`] persisted to a JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens the store at `path`, checking any existing records.
    ///
    /// A missing file is treated as an empty store; it is created on the
    /// first write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if the file exists but does not hold
    /// a JSON array of course records, or [`StoreError::Io`] if it cannot be
    /// read.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        };
        let records = store.load().await?;
        info!(path = %store.path.display(), courses = records.len(), "Course store opened");
        Ok(store)
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record from disk.
    async fn load(&self) -> Result<Vec<CourseRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Vec::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| StoreError::Corrupted {
                path: self.path.clone(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Store file not found, starting empty");
                Ok(Vec::new())
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Writes `records` to disk via a temporary file and rename.
    async fn persist(&self, records: &[CourseRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(records)?;
        let tmp_path = self
            .path
            .with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp_path, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            warn!(error = %e, "Failed to replace store file");
            tokio::fs::remove_file(&tmp_path).await.ok();
            return Err(StoreError::Io(e));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for JsonFileStore {
    #[instrument(skip(self, course), fields(user_id = %course.user_id, title = %course.title))]
    async fn insert_course(&self, course: NewCourse) -> Result<CourseRecord> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let record = insert_into(&mut records, course)?;
        self.persist(&records).await?;
        debug!(course_id = %record.id, "Course written to disk");
        Ok(record)
    }

    async fn get_course(&self, id: Uuid) -> Result<CourseRecord> {
        self.load()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    #[instrument(skip(self, content))]
    async fn update_content(&self, id: Uuid, content: CourseContent) -> Result<CourseRecord> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let record = update_in(&mut records, id, content)?;
        self.persist(&records).await?;
        Ok(record)
    }

    async fn courses_for_user(&self, user_id: &str) -> Result<Vec<CourseRecord>> {
        Ok(owned_by(&self.load().await?, user_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{CourseModule, SkillLevel, StylePreference};

    fn temp_store_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("adaptive_store_{name}_{}", Uuid::new_v4()))
            .join("courses.json")
    }

    fn sample_course() -> NewCourse {
        NewCourse::new(
            "u1",
            SkillLevel::Advanced,
            StylePreference::Flashcards,
            CourseContent::new(
                "Async Rust",
                vec![
                    CourseModule::new("Futures", "Futures are lazy."),
                    CourseModule::new("Executors", "Executors poll futures."),
                ],
            ),
        )
    }

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let path = temp_store_path("missing");
        let store = JsonFileStore::open(&path).await.unwrap();
        assert!(store.courses_for_user("u1").await.unwrap().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let path = temp_store_path("reopen");

        let store = JsonFileStore::open(&path).await.unwrap();
        let record = store.insert_course(sample_course()).await.unwrap();
        let updated = record.content.with_module_content(0, "Futures do nothing until polled.").unwrap();
        store.update_content(record.id, updated.clone()).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let fetched = reopened.get_course(record.id).await.unwrap();
        assert_eq!(fetched.content, updated);
        assert_eq!(fetched.skill_level, SkillLevel::Advanced);
        assert_eq!(fetched.style_preference, StylePreference::Flashcards);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_open_corrupted_file() {
        let path = temp_store_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let result = JsonFileStore::open(&path).await;
        assert!(
            matches!(&result, Err(StoreError::Corrupted { path: p, .. }) if *p == path),
            "Expected Corrupted error, got: {result:?}"
        );

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_two_handles_keep_each_others_updates() {
        let path = temp_store_path("shared");
        let server = JsonFileStore::open(&path).await.unwrap();
        let first = server.insert_course(sample_course()).await.unwrap();

        // A second handle on the same file, as a CLI run alongside the server would have.
        let cli = JsonFileStore::open(&path).await.unwrap();
        let rewritten = first.content.with_module_content(1, "Executors drive futures to completion.").unwrap();
        cli.update_content(first.id, rewritten.clone()).await.unwrap();

        let second = server.insert_course(sample_course()).await.unwrap();

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get_course(first.id).await.unwrap().content, rewritten);
        assert_eq!(server.get_course(first.id).await.unwrap().content, rewritten);
        assert!(reopened.get_course(second.id).await.is_ok());
        assert_eq!(reopened.courses_for_user("u1").await.unwrap().len(), 2);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_failed_update_leaves_records_untouched() {
        let path = temp_store_path("untouched");
        let store = JsonFileStore::open(&path).await.unwrap();
        let record = store.insert_course(sample_course()).await.unwrap();

        let invalid = CourseContent::new("", vec![]);
        assert!(store.update_content(record.id, invalid).await.is_err());
        assert_eq!(store.get_course(record.id).await.unwrap(), record);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
