//! Interview session state machine.
//!
//! This module defines the pure, synchronous state of one diagnostic
//! interview: the question sequence, the answers collected so far, the
//! cursor, and the phase. Outbound calls are not made here; transitions that
//! need one return an [`Advance`] describing the call, and the caller reports
//! the outcome back through [`InterviewSession::followups_loaded`],
//! [`InterviewSession::skip_followups`], [`InterviewSession::complete`] or
//! [`InterviewSession::fail`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diagnostic::{FollowUpRequest, SubmissionOutcome, SubmissionRequest};
use crate::error::{AdaptiveError, Result};
use crate::questions::{general_questions, GENERAL_QUESTION_COUNT, SKILL_LEVEL_INDEX, TOPIC_INDEX};

// ============================================================================
// InterviewPhase
// ============================================================================

/// Current phase of an interview session.
///
/// The phase transitions through these states:
/// - `AskingGeneral` (questions 1-5) -> `FetchingFollowups`
/// - From `FetchingFollowups`:
///   - `AskingFollowup` (follow-ups were generated)
///   - `Submitting` (no follow-ups; general answers are submitted)
///   - `Failed` (generation failed and the fallback aborts)
/// - `AskingFollowup` -> `Submitting` after the last follow-up
/// - `Submitting` -> `Complete` | `Failed`
/// - `Failed` -> resumes on the next advance, edit, or backward step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewPhase {
    /// Answering one of the five general questions.
    #[default]
    AskingGeneral,
    /// Waiting for follow-up questions to be generated.
    FetchingFollowups,
    /// Answering a generated follow-up question.
    AskingFollowup,
    /// Waiting for the submission to be diagnosed.
    Submitting,
    /// The interview produced a diagnosis.
    Complete,
    /// An outbound call failed; the session is resumable.
    Failed,
}

impl InterviewPhase {
    /// Returns `true` if an outbound call is outstanding.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::FetchingFollowups | Self::Submitting)
    }

    /// Returns `true` if the interview is finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Name of the outstanding operation, for busy errors.
    const fn operation(&self) -> &'static str {
        match self {
            Self::FetchingFollowups => "Follow-up generation",
            Self::Submitting => "Submission",
            _ => "Interview",
        }
    }

    const fn for_cursor(cursor: usize) -> Self {
        if cursor < GENERAL_QUESTION_COUNT {
            Self::AskingGeneral
        } else {
            Self::AskingFollowup
        }
    }
}

impl std::fmt::Display for InterviewPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AskingGeneral => "asking_general",
            Self::FetchingFollowups => "fetching_followups",
            Self::AskingFollowup => "asking_followup",
            Self::Submitting => "submitting",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Progress and Advance
// ============================================================================

/// Position within the question sequence, one-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// The current question number.
    pub current: usize,
    /// The number of questions known so far.
    pub total: usize,
}

/// What an accepted advance asks the caller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The cursor moved; nothing else to do.
    Moved,
    /// Generate follow-up questions, then report back.
    FetchFollowups(FollowUpRequest),
    /// Submit the answers, then report back.
    Submit(SubmissionRequest),
}

// ============================================================================
// InterviewSession
// ============================================================================

/// The state of one diagnostic interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSession {
    /// Session identifier.
    pub id: Uuid,

    /// Owner for persisted courses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Language of questions and generated content.
    pub language: String,

    /// Current phase.
    pub phase: InterviewPhase,

    /// Zero-based index of the current question.
    pub cursor: usize,

    /// General questions followed by any generated follow-ups.
    pub questions: Vec<String>,

    /// One answer slot per question.
    pub responses: Vec<String>,

    /// Whether follow-up generation has settled (with or without questions).
    pub followups_resolved: bool,

    /// User-facing message from the last failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Informational message, e.g. that follow-ups were skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,

    /// The diagnosis, once complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SubmissionOutcome>,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When the session last changed.
    pub updated_at: DateTime<Utc>,
}

impl InterviewSession {
    /// Creates a session positioned on the first general question.
    #[must_use]
    pub fn new(user_id: Option<String>, language: impl Into<String>) -> Self {
        let language = language.into();
        let questions = general_questions(&language);
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            language,
            phase: InterviewPhase::AskingGeneral,
            cursor: 0,
            responses: vec![String::new(); questions.len()],
            questions,
            followups_resolved: false,
            error: None,
            notice: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the text of the current question.
    #[must_use]
    pub fn current_question(&self) -> &str {
        self.questions.get(self.cursor).map_or("", String::as_str)
    }

    /// Returns the answer at the cursor.
    #[must_use]
    pub fn current_answer(&self) -> &str {
        self.responses.get(self.cursor).map_or("", String::as_str)
    }

    /// Returns `true` if the cursor is on a generated follow-up.
    #[must_use]
    pub const fn is_followup(&self) -> bool {
        self.cursor >= GENERAL_QUESTION_COUNT
    }

    /// Returns the one-based position and the known question count.
    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress {
            current: self.cursor + 1,
            total: self.questions.len(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.phase.is_busy() {
            return Err(AdaptiveError::busy(self.phase.operation()));
        }
        if self.phase.is_terminal() {
            return Err(AdaptiveError::invalid_transition(self.phase, "editing"));
        }
        Ok(())
    }

    /// Replaces the answer at the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::Busy`] while a call is outstanding, or
    /// [`AdaptiveError::InvalidStateTransition`] once complete.
    pub fn set_answer(&mut self, answer: impl Into<String>) -> Result<()> {
        self.ensure_editable()?;
        if let Some(slot) = self.responses.get_mut(self.cursor) {
            *slot = answer.into();
        }
        self.touch();
        Ok(())
    }

    /// Moves to the previous question without touching any answer.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::InvalidStateTransition`] on the first
    /// question or once complete, or [`AdaptiveError::Busy`] while a call is
    /// outstanding.
    pub fn previous(&mut self) -> Result<()> {
        self.ensure_editable()?;
        if self.cursor == 0 {
            return Err(AdaptiveError::invalid_transition("question 1", "previous question"));
        }
        self.cursor -= 1;
        self.phase = InterviewPhase::for_cursor(self.cursor);
        self.error = None;
        self.touch();
        Ok(())
    }

    /// Accepts the current answer and moves forward.
    ///
    /// From the fifth general question this starts follow-up generation the
    /// first time, and from the last question it starts submission. From
    /// `Failed` this retries whatever the cursor position calls for.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::EmptyAnswer`] if the current answer is blank,
    /// [`AdaptiveError::Busy`] while a call is outstanding, or
    /// [`AdaptiveError::InvalidStateTransition`] once complete.
    pub fn advance(&mut self) -> Result<Advance> {
        self.ensure_editable()?;
        if self.current_answer().trim().is_empty() {
            return Err(AdaptiveError::EmptyAnswer { index: self.cursor });
        }

        self.error = None;
        self.touch();

        if self.cursor + 1 < self.questions.len() {
            self.cursor += 1;
            self.phase = InterviewPhase::for_cursor(self.cursor);
            return Ok(Advance::Moved);
        }

        if self.followups_resolved {
            self.phase = InterviewPhase::Submitting;
            Ok(Advance::Submit(self.submission()))
        } else {
            self.phase = InterviewPhase::FetchingFollowups;
            Ok(Advance::FetchFollowups(FollowUpRequest::new(
                self.responses[TOPIC_INDEX].trim(),
                self.responses[SKILL_LEVEL_INDEX].trim(),
                self.language.clone(),
            )))
        }
    }

    fn submission(&self) -> SubmissionRequest {
        SubmissionRequest::new(
            self.responses.clone(),
            self.user_id.clone(),
            self.language.clone(),
        )
    }

    fn expect_phase(&self, expected: InterviewPhase, to: InterviewPhase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(AdaptiveError::invalid_transition(self.phase, to))
        }
    }

    /// Appends generated follow-ups and moves to the first of them.
    ///
    /// An empty list is rejected; use [`Self::skip_followups`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::InvalidStateTransition`] unless fetching
    /// follow-ups, or [`AdaptiveError::InvalidAiResponse`] for an empty list.
    pub fn followups_loaded(&mut self, questions: Vec<String>) -> Result<()> {
        self.expect_phase(InterviewPhase::FetchingFollowups, InterviewPhase::AskingFollowup)?;
        if questions.is_empty() {
            return Err(AdaptiveError::invalid_ai_response("no follow-up questions"));
        }

        self.questions.truncate(GENERAL_QUESTION_COUNT);
        self.responses.truncate(GENERAL_QUESTION_COUNT);
        self.responses.resize(GENERAL_QUESTION_COUNT + questions.len(), String::new());
        self.questions.extend(questions);
        self.followups_resolved = true;
        self.cursor = GENERAL_QUESTION_COUNT;
        self.phase = InterviewPhase::AskingFollowup;
        self.touch();
        Ok(())
    }

    /// Gives up on follow-ups and moves straight to submission.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::InvalidStateTransition`] unless fetching
    /// follow-ups.
    pub fn skip_followups(&mut self, notice: impl Into<String>) -> Result<SubmissionRequest> {
        self.expect_phase(InterviewPhase::FetchingFollowups, InterviewPhase::Submitting)?;
        self.followups_resolved = true;
        self.notice = Some(notice.into());
        self.phase = InterviewPhase::Submitting;
        self.touch();
        Ok(self.submission())
    }

    /// Records the diagnosis and finishes the interview.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::InvalidStateTransition`] unless submitting.
    pub fn complete(&mut self, outcome: SubmissionOutcome) -> Result<()> {
        self.expect_phase(InterviewPhase::Submitting, InterviewPhase::Complete)?;
        self.result = Some(outcome);
        self.phase = InterviewPhase::Complete;
        self.touch();
        Ok(())
    }

    /// Records a failed outbound call. Answers are kept.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::InvalidStateTransition`] unless a call is
    /// outstanding.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        if !self.phase.is_busy() {
            return Err(AdaptiveError::invalid_transition(self.phase, InterviewPhase::Failed));
        }
        self.error = Some(message.into());
        self.phase = InterviewPhase::Failed;
        self.touch();
        Ok(())
    }

    /// Returns a serializable view for clients.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            phase: self.phase,
            question: self.current_question().to_string(),
            answer: self.current_answer().to_string(),
            is_followup: self.is_followup(),
            progress: self.progress(),
            language: self.language.clone(),
            responses: self.responses.clone(),
            error: self.error.clone(),
            notice: self.notice.clone(),
            result: self.result.clone(),
        }
    }
}

/// Client view of an interview session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: Uuid,
    /// Current phase.
    pub phase: InterviewPhase,
    /// Text of the current question.
    pub question: String,
    /// Answer at the cursor.
    pub answer: String,
    /// Whether the current question is a follow-up ("technical deep dive").
    pub is_followup: bool,
    /// Position in the question sequence.
    pub progress: Progress,
    /// Session language.
    pub language: String,
    /// All answers collected so far.
    pub responses: Vec<String>,
    /// Message from the last failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Informational message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    /// The diagnosis, once complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SubmissionOutcome>,
}
