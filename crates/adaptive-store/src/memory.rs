//! In-memory content store.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{ContentStore, CourseContent, CourseRecord, NewCourse, Result, StoreError};

/// A [`ContentStore`] that keeps records in process memory.
///
/// Records are kept in insertion order; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<CourseRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored courses.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns `true` if the store holds no courses.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Inserts into an ordered record list after validating constraints.
pub(crate) fn insert_into(records: &mut Vec<CourseRecord>, course: NewCourse) -> Result<CourseRecord> {
    course.validate()?;
    let record = course.into_record();
    records.push(record.clone());
    Ok(record)
}

/// Replaces the content of one record in an ordered record list.
pub(crate) fn update_in(
    records: &mut [CourseRecord],
    id: Uuid,
    content: CourseContent,
) -> Result<CourseRecord> {
    content.validate()?;
    let record = records
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or(StoreError::NotFound(id))?;
    record.title.clone_from(&content.title);
    record.content = content;
    record.updated_at = Utc::now();
    Ok(record.clone())
}

/// Lists a user's records, newest first.
pub(crate) fn owned_by(records: &[CourseRecord], user_id: &str) -> Vec<CourseRecord> {
    records
        .iter()
        .rev()
        .filter(|r| r.user_id == user_id)
        .cloned()
        .collect()
}

#[async_trait]
impl ContentStore for MemoryStore {
    #[instrument(skip(self, course), fields(user_id = %course.user_id, title = %course.title))]
    async fn insert_course(&self, course: NewCourse) -> Result<CourseRecord> {
        let mut records = self.records.write().await;
        let record = insert_into(&mut records, course)?;
        debug!(course_id = %record.id, "Course stored in memory");
        Ok(record)
    }

    async fn get_course(&self, id: Uuid) -> Result<CourseRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    #[instrument(skip(self, content))]
    async fn update_content(&self, id: Uuid, content: CourseContent) -> Result<CourseRecord> {
        let mut records = self.records.write().await;
        update_in(&mut records, id, content)
    }

    async fn courses_for_user(&self, user_id: &str) -> Result<Vec<CourseRecord>> {
        Ok(owned_by(&self.records.read().await, user_id))
    }
}
