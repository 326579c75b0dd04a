//! Adaptive Content Store
//!
//! Course records produced by the diagnostic interview, and the stores that
//! persist them.
//!
//! This crate provides the persisted data model ([`CourseRecord`],
//! [`CourseContent`], the enumerated [`SkillLevel`] and [`StylePreference`]
//! columns) together with the [`ContentStore`] trait and two implementations:
//! [`MemoryStore`] and [`JsonFileStore`].

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No course exists with the given id.
    #[error("course not found: {0}")]
    NotFound(Uuid),

    /// The record violates a storage constraint.
    #[error("invalid course record: {0}")]
    InvalidRecord(String),

    /// The backing file holds data that cannot be loaded.
    #[error("corrupted store file '{path}': {message}")]
    Corrupted {
        /// Path to the store file.
        path: PathBuf,
        /// Description of the corruption.
        message: String,
    },

    /// Failed to read or write the backing file.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize records.
    #[error("store serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Enumerated columns
// ============================================================================

/// Learner skill level as judged by the diagnostic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillLevel {
    /// New to the subject (default).
    #[default]
    Beginner,
    /// Comfortable with the basics.
    Intermediate,
    /// Experienced practitioner.
    Advanced,
}

impl SkillLevel {
    /// All accepted values, in storage order.
    pub const ALL: [Self; 3] = [Self::Beginner, Self::Intermediate, Self::Advanced];

    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
        }
    }

    /// Parses an exact (case-sensitive) stored value.
    #[must_use]
    pub fn parse_exact(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == value)
    }
}

impl std::fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preferred learning format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StylePreference {
    /// Video lessons (default).
    #[default]
    Video,
    /// Written material.
    #[serde(rename = "PDF")]
    Pdf,
    /// Spaced-repetition flashcards.
    Flashcards,
}

impl StylePreference {
    /// All accepted values, in storage order.
    pub const ALL: [Self; 3] = [Self::Video, Self::Pdf, Self::Flashcards];

    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "Video",
            Self::Pdf => "PDF",
            Self::Flashcards => "Flashcards",
        }
    }

    /// Parses an exact (case-sensitive) stored value.
    #[must_use]
    pub fn parse_exact(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|style| style.as_str() == value)
    }
}

impl std::fmt::Display for StylePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Course content
// ============================================================================

/// A single lesson module of a generated course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseModule {
    /// Module title.
    pub title: String,
    /// Lesson text.
    #[serde(default)]
    pub content: String,
}

impl CourseModule {
    /// Creates a module from a title and lesson text.
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Structured syllabus content stored with a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseContent {
    /// Course title.
    pub title: String,
    /// Ordered lesson modules.
    #[serde(default)]
    pub modules: Vec<CourseModule>,
    /// Estimated hours to complete, when the generator supplied one.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_hours"
    )]
    pub estimated_hours: Option<u32>,
}

impl CourseContent {
    /// Creates content with the given title and modules.
    #[must_use]
    pub fn new(title: impl Into<String>, modules: Vec<CourseModule>) -> Self {
        Self {
            title: title.into(),
            modules,
            estimated_hours: None,
        }
    }

    /// Checks that the content has a non-blank title and at least one module.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(StoreError::InvalidRecord(
                "course title must not be empty".to_string(),
            ));
        }
        if self.modules.is_empty() {
            return Err(StoreError::InvalidRecord(
                "course must contain at least one module".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns a copy with the lesson text of one module replaced.
    ///
    /// Every other module, and the replaced module's title, are left as is.
    /// Returns `None` when `index` is outside the module list.
    #[must_use]
    pub fn with_module_content(&self, index: usize, content: impl Into<String>) -> Option<Self> {
        if index >= self.modules.len() {
            return None;
        }
        let mut updated = self.clone();
        updated.modules[index].content = content.into();
        Some(updated)
    }
}

/// Accepts `10`, `10.5` or `"10"` and ignores anything else.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_hours<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let hours = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(hours
        .filter(|h| h.is_finite() && *h >= 0.0 && *h <= f64::from(u32::MAX))
        .map(|h| h.round() as u32))
}

// ============================================================================
// Course records
// ============================================================================

/// A persisted course owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    /// Identifier assigned by the store.
    pub id: Uuid,
    /// Owning user.
    pub user_id: String,
    /// Course title (copied from the content).
    pub title: String,
    /// Style the course was generated for.
    pub style_preference: StylePreference,
    /// Skill level the course was generated for.
    pub skill_level: SkillLevel,
    /// Syllabus content.
    pub content: CourseContent,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl CourseRecord {
    /// Returns the number of modules in the course.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.content.modules.len()
    }
}

/// A course ready to be inserted into a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    /// Owning user.
    pub user_id: String,
    /// Course title.
    pub title: String,
    /// Style the course was generated for.
    pub style_preference: StylePreference,
    /// Skill level the course was generated for.
    pub skill_level: SkillLevel,
    /// Syllabus content.
    pub content: CourseContent,
}

impl NewCourse {
    /// Creates a new course for `user_id`, titled after its content.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        skill_level: SkillLevel,
        style_preference: StylePreference,
        content: CourseContent,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            title: content.title.clone(),
            style_preference,
            skill_level,
            content,
        }
    }

    /// Checks storage constraints before insertion.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(StoreError::InvalidRecord(
                "user id must not be empty".to_string(),
            ));
        }
        self.content.validate()
    }

    /// Turns the new course into a record with a fresh id.
    #[must_use]
    pub(crate) fn into_record(self) -> CourseRecord {
        let now = Utc::now();
        CourseRecord {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            title: self.title,
            style_preference: self.style_preference,
            skill_level: self.skill_level,
            content: self.content,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Store trait
// ============================================================================

/// Persistence layer holding user-owned course records.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Inserts a new course and returns the stored record.
    async fn insert_course(&self, course: NewCourse) -> Result<CourseRecord>;

    /// Fetches a course by id.
    async fn get_course(&self, id: Uuid) -> Result<CourseRecord>;

    /// Replaces the whole content blob of a course.
    ///
    /// Either the full update is stored or nothing changes.
    async fn update_content(&self, id: Uuid, content: CourseContent) -> Result<CourseRecord>;

    /// Lists the courses owned by `user_id`, newest first.
    async fn courses_for_user(&self, user_id: &str) -> Result<Vec<CourseRecord>>;
}
