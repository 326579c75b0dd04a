//! Course Syllabus Export
//!
//! This crate turns stored courses into shareable documents. A [`Syllabus`]
//! is the export view of a course record; it can be rendered to Markdown for
//! reading or serialized to JSON for other tools.
//!
//! # Generators
//!
//! - [`json::JsonGenerator`] - Compact or pretty JSON
//! - [`MarkdownGenerator`] - Human-readable Markdown
//!
//! # Example
//!
//! ```rust
//! use adaptive_store::{CourseContent, CourseModule, SkillLevel, StylePreference};
//! use adaptive_syllabus::{MarkdownGenerator, Syllabus};
//!
//! let content = CourseContent::new("Rust Basics", vec![CourseModule::new("Intro", "Hello.")]);
//! let syllabus = Syllabus::from_content(content, SkillLevel::Beginner, StylePreference::Video).unwrap();
//!
//! let markdown = MarkdownGenerator::new(&syllabus).generate();
//! assert!(markdown.starts_with("# Rust Basics"));
//! ```

pub mod json;
mod markdown;

pub use markdown::MarkdownGenerator;

use adaptive_store::{CourseContent, CourseModule, CourseRecord, SkillLevel, StylePreference};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while exporting a course.
#[derive(Debug, Error)]
pub enum SyllabusError {
    /// Failed to serialize the syllabus to JSON.
    #[error("failed to serialize syllabus: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to write the export file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The course cannot be exported as it stands.
    #[error("invalid course data: {0}")]
    InvalidData(String),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, SyllabusError>;

// ============================================================================
// Syllabus
// ============================================================================

/// Export view of a generated course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Syllabus {
    /// Store identifier, absent for courses that were never saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<Uuid>,
    /// Course title.
    pub title: String,
    /// Skill level the course targets.
    pub skill_level: SkillLevel,
    /// Learning style the course was written for.
    pub style_preference: StylePreference,
    /// Estimated hours to complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<u32>,
    /// Ordered lesson modules.
    pub modules: Vec<CourseModule>,
    /// When the course was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the course was last updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Syllabus {
    /// Builds a syllabus from unsaved course content.
    ///
    /// # Errors
    ///
    /// Returns [`SyllabusError::InvalidData`] if the content has a blank
    /// title or no modules.
    pub fn from_content(
        content: CourseContent,
        skill_level: SkillLevel,
        style_preference: StylePreference,
    ) -> Result<Self> {
        content
            .validate()
            .map_err(|e| SyllabusError::InvalidData(e.to_string()))?;
        Ok(Self {
            course_id: None,
            title: content.title,
            skill_level,
            style_preference,
            estimated_hours: content.estimated_hours,
            modules: content.modules,
            created_at: None,
            updated_at: None,
        })
    }

    /// Returns the number of modules.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

impl TryFrom<&CourseRecord> for Syllabus {
    type Error = SyllabusError;

    fn try_from(record: &CourseRecord) -> Result<Self> {
        let mut syllabus = Self::from_content(
            record.content.clone(),
            record.skill_level,
            record.style_preference,
        )?;
        syllabus.course_id = Some(record.id);
        syllabus.created_at = Some(record.created_at);
        syllabus.updated_at = Some(record.updated_at);
        Ok(syllabus)
    }
}

// ============================================================================
// Tests
// ============================================================================
