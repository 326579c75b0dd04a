//! Request, result, and coercion types for the diagnostic contracts.
//!
//! These are the payloads exchanged between the interview driver, the
//! diagnostic service, and the HTTP API.

use adaptive_store::{CourseContent, CourseRecord, SkillLevel, StylePreference};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::config::DEFAULT_LANGUAGE;
use crate::error::{AdaptiveError, Result};
use crate::questions::GENERAL_QUESTION_COUNT;

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

// ============================================================================
// Follow-up generation
// ============================================================================

/// Request for topic-specific follow-up questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRequest {
    /// The learner's topic of interest.
    #[serde(default)]
    pub topic: String,

    /// The learner's self-described experience level.
    #[serde(default)]
    pub skill_level: String,

    /// Language for the generated questions.
    #[serde(default = "default_language")]
    pub language: String,
}

impl FollowUpRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        skill_level: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            skill_level: skill_level.into(),
            language: language.into(),
        }
    }

    /// Checks that both topic and skill level are present.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::InvalidRequest`] if either is blank.
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() || self.skill_level.trim().is_empty() {
            return Err(AdaptiveError::invalid_request("Missing topic or skillLevel"));
        }
        Ok(())
    }
}

// ============================================================================
// Submission
// ============================================================================

/// A completed set of interview answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    /// General answers followed by follow-up answers.
    #[serde(default)]
    pub responses: Vec<String>,

    /// Owner for persisted courses; courses are not saved without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Language for generated content.
    #[serde(default = "default_language")]
    pub language: String,
}

impl SubmissionRequest {
    /// Creates a new submission.
    #[must_use]
    pub fn new(responses: Vec<String>, user_id: Option<String>, language: impl Into<String>) -> Self {
        Self {
            responses,
            user_id,
            language: language.into(),
        }
    }

    /// Returns the owner id if one is present and non-blank.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Checks the response count and that every general answer is present.
    ///
    /// Accepts the five general answers alone (follow-ups skipped) or
    /// followed by up to `max_followups` follow-up answers.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::InvalidRequest`] on a bad count, or
    /// [`AdaptiveError::EmptyAnswer`] for a blank general answer.
    pub fn validate(&self, max_followups: usize) -> Result<()> {
        let max = GENERAL_QUESTION_COUNT + max_followups;
        let count = self.responses.len();
        if !(GENERAL_QUESTION_COUNT..=max).contains(&count) {
            return Err(AdaptiveError::invalid_request(format!(
                "Invalid responses. Expected between {GENERAL_QUESTION_COUNT} and {max} answers, got {count}."
            )));
        }

        if let Some(index) = self.responses[..GENERAL_QUESTION_COUNT]
            .iter()
            .position(|r| r.trim().is_empty())
        {
            return Err(AdaptiveError::EmptyAnswer { index });
        }
        Ok(())
    }
}

/// The diagnosis exactly as the reasoning service returned it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDiagnostic {
    /// Claimed skill level; may be outside the known set.
    #[serde(default)]
    pub skill_level: Option<String>,

    /// Claimed style preference; may be outside the known set.
    #[serde(default)]
    pub style_preference: Option<String>,

    /// Topics to build courses for.
    #[serde(default)]
    pub recommended_topics: Vec<String>,
}

impl RawDiagnostic {
    /// Coerces unknown enum values to their defaults.
    ///
    /// Matching is exact and case-sensitive. Blank topics are dropped.
    #[must_use]
    pub fn coerce(self) -> DiagnosticResult {
        let raw_level = self.skill_level.unwrap_or_default();
        let skill_level = SkillLevel::parse_exact(&raw_level).unwrap_or_else(|| {
            warn!(value = %raw_level, "Unknown skill level from reasoning service, using Beginner");
            SkillLevel::default()
        });

        let raw_style = self.style_preference.unwrap_or_default();
        let style_preference = StylePreference::parse_exact(&raw_style).unwrap_or_else(|| {
            warn!(value = %raw_style, "Unknown style preference from reasoning service, using Video");
            StylePreference::default()
        });

        DiagnosticResult {
            skill_level,
            style_preference,
            recommended_topics: self
                .recommended_topics
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

/// The coerced outcome of a diagnostic interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticResult {
    /// Assessed skill level.
    pub skill_level: SkillLevel,
    /// Preferred learning style.
    pub style_preference: StylePreference,
    /// Topics to build courses for, in order.
    pub recommended_topics: Vec<String>,
}

/// A course generated for one recommended topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneratedCourse {
    /// Persisted to the content store.
    Saved(CourseRecord),
    /// Generated but not persisted (no owner, no store, or the insert failed).
    Unsaved(CourseContent),
}

impl GeneratedCourse {
    /// Returns the generated content.
    #[must_use]
    pub const fn content(&self) -> &CourseContent {
        match self {
            Self::Saved(record) => &record.content,
            Self::Unsaved(content) => content,
        }
    }

    /// Returns the stored course id, if persisted.
    #[must_use]
    pub const fn id(&self) -> Option<Uuid> {
        match self {
            Self::Saved(record) => Some(record.id),
            Self::Unsaved(_) => None,
        }
    }
}

/// Everything a successful submission produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    /// The coerced diagnosis.
    pub diagnostic: DiagnosticResult,
    /// One entry per topic whose syllabus was generated.
    #[serde(default)]
    pub courses: Vec<GeneratedCourse>,
}

// ============================================================================
// Personalization
// ============================================================================

/// Request to rewrite one module of a stored course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizeRequest {
    /// Course to update.
    #[serde(default)]
    pub course_id: Option<Uuid>,

    /// Zero-based module index.
    #[serde(default)]
    pub module_index: Option<usize>,

    /// Learner feedback steering the rewrite.
    #[serde(default)]
    pub feedback: String,

    /// Language for the rewritten content.
    #[serde(default = "default_language")]
    pub language: String,
}

/// A validated personalization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonFeedback {
    /// Course to update.
    pub course_id: Uuid,
    /// Zero-based module index.
    pub module_index: usize,
    /// Learner feedback steering the rewrite.
    pub feedback: String,
    /// Language for the rewritten content.
    pub language: String,
}

impl PersonalizeRequest {
    /// Checks required fields and returns the validated request.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::InvalidRequest`] if the course id, module
    /// index, or feedback is missing.
    pub fn validated(self) -> Result<LessonFeedback> {
        match (self.course_id, self.module_index) {
            (Some(course_id), Some(module_index)) if !self.feedback.trim().is_empty() => {
                Ok(LessonFeedback {
                    course_id,
                    module_index,
                    feedback: self.feedback,
                    language: self.language,
                })
            }
            _ => Err(AdaptiveError::invalid_request("Missing required fields")),
        }
    }
}
