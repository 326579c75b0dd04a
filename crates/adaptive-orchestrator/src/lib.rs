//! Adaptive Diagnostic Orchestrator
//!
//! Runs the diagnostic interview, turns its answers into a learner profile
//! and generated courses, and serves it all over HTTP and WebSocket.

pub mod api;
pub mod backend;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod flight;
pub mod gemini;
pub mod interview;
pub mod interviewer;
pub mod questions;
pub mod reasoning;
pub mod retry;
pub mod service;
pub mod websocket;

pub use api::{create_router, ApiError, AppState, ErrorResponse};
pub use backend::{DiagnosticBackend, HttpBackend};
pub use config::{Config, FollowupFallback, StoreBackend, CONFIG_FILE_NAME, DEFAULT_LANGUAGE};
pub use diagnostic::{
    DiagnosticResult, FollowUpRequest, GeneratedCourse, LessonFeedback, PersonalizeRequest,
    SubmissionOutcome, SubmissionRequest,
};
pub use error::{AdaptiveError, ReasoningErrorKind, Result, INVALID_AI_RESPONSE};
pub use gemini::GeminiClient;
pub use interview::{Advance, InterviewPhase, InterviewSession, Progress, SessionSnapshot};
pub use interviewer::{Interviewer, SessionRegistry};
pub use questions::{general_questions, GENERAL_QUESTION_COUNT, SUPPORTED_LANGUAGES};
pub use reasoning::{PromptKind, ReasoningRequest, ReasoningService, ScriptedReasoning};
pub use retry::RetryPolicy;
pub use service::DiagnosticService;
pub use websocket::{EventBroadcaster, SessionEvent};
