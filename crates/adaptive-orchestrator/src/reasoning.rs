//! Reasoning service abstraction, prompts, and reply parsing.
//!
//! The reasoning service is an opaque `text -> text` function. Replies are
//! expected to contain JSON, possibly wrapped in prose; the parsers here
//! extract the first-to-last brace (or bracket) span and validate it.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use adaptive_store::{CourseContent, SkillLevel, StylePreference};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::diagnostic::{FollowUpRequest, RawDiagnostic};
use crate::error::{AdaptiveError, ReasoningErrorKind, Result};

// ============================================================================
// Reasoning Service Trait
// ============================================================================

/// Which contract a prompt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Topic-specific follow-up questions.
    FollowUpQuestions,
    /// Skill level, style, and topics from interview answers.
    Diagnosis,
    /// A course syllabus for one topic.
    Syllabus,
    /// A rewrite of one module's content.
    Personalization,
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FollowUpQuestions => "follow-up generation",
            Self::Diagnosis => "diagnosis",
            Self::Syllabus => "syllabus generation",
            Self::Personalization => "personalization",
        };
        write!(f, "{s}")
    }
}

/// A single prompt sent to the reasoning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningRequest {
    /// Which contract this prompt serves.
    pub kind: PromptKind,
    /// The full prompt text.
    pub prompt: String,
}

impl ReasoningRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(kind: PromptKind, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
        }
    }
}

/// A text-completion backend.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Sends one prompt and returns the raw reply text.
    async fn complete(&self, request: ReasoningRequest) -> Result<String>;
}

// ============================================================================
// Prompts
// ============================================================================

/// Builds the follow-up question prompt.
#[must_use]
pub fn follow_up_prompt(request: &FollowUpRequest, max_questions: usize) -> ReasoningRequest {
    let prompt = format!(
        r#"You are an adaptive learning AI conducting a diagnostic interview.
The learner wants to study "{topic}" and describes their experience as "{skill}".

Write up to {max_questions} short, field-specific questions that reveal what they already know about {topic} and where the gaps are.
IMPORTANT: Write the questions in {language}.

Return ONLY a valid JSON array of strings in this exact format:
["question 1", "question 2", "question 3"]"#,
        topic = request.topic,
        skill = request.skill_level,
        language = request.language,
    );
    ReasoningRequest::new(PromptKind::FollowUpQuestions, prompt)
}

/// Builds the diagnosis prompt from every collected answer.
#[must_use]
pub fn diagnosis_prompt(responses: &[String], language: &str) -> ReasoningRequest {
    let answers = responses
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, r.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        r#"You are an adaptive learning AI. Based on these user responses to diagnostic questions:

{answers}

Analyze the user's skill level (Beginner/Intermediate/Advanced) and determine their learning preference.
IMPORTANT: Your JSON response content (like topic names) should be in {language}.
HOWEVER, keep the values for "skillLevel" and "stylePreference" in English exactly as specified.

Return ONLY a valid JSON object in this exact format:
{{
  "skillLevel": "Beginner" | "Intermediate" | "Advanced",
  "stylePreference": "Video" | "PDF" | "Flashcards",
  "recommendedTopics": ["topic1", "topic2", "topic3"]
}}"#
    );
    ReasoningRequest::new(PromptKind::Diagnosis, prompt)
}

/// Builds the syllabus prompt for one topic.
#[must_use]
pub fn syllabus_prompt(
    topic: &str,
    skill_level: SkillLevel,
    style: StylePreference,
    language: &str,
) -> ReasoningRequest {
    let prompt = format!(
        r#"Create a detailed course syllabus on "{topic}" for a {skill_level} learner who prefers {style} format.
IMPORTANT: All text in the syllabus content (titles, module names, lesson descriptions) must be in {language}.

Return ONLY a valid JSON object in this format:
{{
  "title": "Course Title",
  "modules": [
    {{
      "title": "Module Title",
      "content": "Detailed lesson content and explanation"
    }}
  ],
  "estimatedHours": 10
}}"#
    );
    ReasoningRequest::new(PromptKind::Syllabus, prompt)
}

/// Builds the prompt that rewrites one module.
#[must_use]
pub fn personalization_prompt(
    module_title: &str,
    module_content: &str,
    feedback: &str,
    language: &str,
) -> ReasoningRequest {
    let prompt = format!(
        r#"You are an adaptive learning AI personalizing one lesson.
Lesson title: "{module_title}"

Current lesson content:
{module_content}

The learner gave this feedback: "{feedback}"
Rewrite the lesson content to address the feedback while covering the same material.
IMPORTANT: Write the lesson in {language}.

Return ONLY the rewritten lesson content as plain text, without the title and without JSON."#
    );
    ReasoningRequest::new(PromptKind::Personalization, prompt)
}

// ============================================================================
// Reply Parsing
// ============================================================================

static OBJECT_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").ok());
static ARRAY_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\[[\s\S]*\]").ok());

/// Returns the greedy match of `pattern`, or the whole text if none.
fn extract<'a>(pattern: &Lazy<Option<Regex>>, text: &'a str) -> &'a str {
    pattern
        .as_ref()
        .and_then(|re| re.find(text))
        .map_or(text, |m| m.as_str())
}

fn invalid(kind: PromptKind, reply: &str, err: impl std::fmt::Display) -> AdaptiveError {
    warn!(%kind, error = %err, reply_len = reply.len(), "Failed to parse reasoning reply");
    AdaptiveError::invalid_ai_response(format!("{kind}: {err}"))
}

#[derive(Deserialize)]
struct QuestionList {
    questions: Vec<String>,
}

/// Parses follow-up questions from a JSON array or `{"questions": [...]}`.
///
/// Blank entries are dropped and the list is capped at `max`.
///
/// # Errors
///
/// Returns [`AdaptiveError::InvalidAiResponse`] if neither shape parses.
pub fn parse_follow_ups(reply: &str, max: usize) -> Result<Vec<String>> {
    let questions = serde_json::from_str::<Vec<String>>(extract(&ARRAY_PATTERN, reply))
        .or_else(|_| {
            serde_json::from_str::<QuestionList>(extract(&OBJECT_PATTERN, reply)).map(|l| l.questions)
        })
        .map_err(|e| invalid(PromptKind::FollowUpQuestions, reply, e))?;

    Ok(questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(max)
        .collect())
}

/// Parses the uncoerced diagnosis object.
///
/// # Errors
///
/// Returns [`AdaptiveError::InvalidAiResponse`] if no JSON object parses.
pub fn parse_diagnosis(reply: &str) -> Result<RawDiagnostic> {
    serde_json::from_str(extract(&OBJECT_PATTERN, reply))
        .map_err(|e| invalid(PromptKind::Diagnosis, reply, e))
}

/// Parses and validates a syllabus object.
///
/// # Errors
///
/// Returns [`AdaptiveError::InvalidAiResponse`] if no JSON object parses, the
/// title is blank, or there are no modules.
pub fn parse_syllabus(reply: &str) -> Result<CourseContent> {
    let content: CourseContent = serde_json::from_str(extract(&OBJECT_PATTERN, reply))
        .map_err(|e| invalid(PromptKind::Syllabus, reply, e))?;
    content
        .validate()
        .map_err(|e| invalid(PromptKind::Syllabus, reply, e))?;
    Ok(content)
}

/// Cleans a rewritten lesson reply.
///
/// Surrounding code fences are removed.
///
/// # Errors
///
/// Returns [`AdaptiveError::InvalidAiResponse`] if nothing remains.
pub fn parse_lesson(reply: &str) -> Result<String> {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let body = rest.split_once('\n').map_or("", |(_, body)| body);
        text = body.trim_end().strip_suffix("```").unwrap_or(body).trim();
    }

    if text.is_empty() {
        return Err(invalid(PromptKind::Personalization, reply, "empty lesson"));
    }
    Ok(text.to_string())
}

// ============================================================================
// Scripted Reasoning Service (Testing)
// ============================================================================

/// A pre-configured reply for [`ScriptedReasoning`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Reply with this text.
    Text(String),
    /// Fail with a reasoning API error of this kind.
    Fail(ReasoningErrorKind),
}

/// Reasoning service with scripted replies per prompt kind.
///
/// Replies are consumed in order; a kind with no replies left fails with an
/// invalid-response error. Every request is recorded for assertions.
///
/// ```rust,ignore
/// let reasoning = ScriptedReasoning::new()
///     .reply(PromptKind::FollowUpQuestions, r#"["Q6", "Q7", "Q8"]"#)
///     .fail(PromptKind::Diagnosis, ReasoningErrorKind::Server);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedReasoning {
    replies: Mutex<HashMap<PromptKind, VecDeque<ScriptedReply>>>,
    requests: Mutex<Vec<ReasoningRequest>>,
    delay: Option<Duration>,
}

impl ScriptedReasoning {
    /// Creates a service with no scripted replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, kind: PromptKind, reply: ScriptedReply) -> Self {
        self.replies
            .try_lock()
            .map(|mut replies| replies.entry(kind).or_default().push_back(reply))
            .ok();
        self
    }

    /// Queues a text reply for `kind`.
    #[must_use]
    pub fn reply(self, kind: PromptKind, text: impl Into<String>) -> Self {
        self.push(kind, ScriptedReply::Text(text.into()))
    }

    /// Queues a failure for `kind`.
    #[must_use]
    pub fn fail(self, kind: PromptKind, error: ReasoningErrorKind) -> Self {
        self.push(kind, ScriptedReply::Fail(error))
    }

    /// Delays every reply, to keep calls outstanding.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns how many requests of `kind` were received.
    pub async fn calls(&self, kind: PromptKind) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Returns every request received, in order.
    pub async fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoning {
    async fn complete(&self, request: ReasoningRequest) -> Result<String> {
        let kind = request.kind;
        self.requests.lock().await.push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .replies
            .lock()
            .await
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Fail(error)) => {
                Err(AdaptiveError::reasoning_api(error, format!("scripted {kind} failure")))
            }
            None => Err(AdaptiveError::invalid_ai_response(format!(
                "no scripted reply for {kind}"
            ))),
        }
    }
}
