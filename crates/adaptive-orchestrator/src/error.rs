//! Error types for the Adaptive diagnostic orchestrator.
//!
//! This module defines the error hierarchy for all orchestrator operations,
//! including configuration loading, interview transitions, reasoning service
//! calls, and course persistence.

use std::path::PathBuf;

use adaptive_store::StoreError;
use axum::http::StatusCode;
use uuid::Uuid;

/// A specialized `Result` type for orchestrator operations.
pub type Result<T> = std::result::Result<T, AdaptiveError>;

/// Generic message surfaced when reasoning output cannot be used.
pub const INVALID_AI_RESPONSE: &str = "Invalid AI response format";

/// Errors that can occur while running diagnostic interviews.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum AdaptiveError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your adaptive.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Input Validation Errors
    // ========================================================================
    /// A request was missing required fields or had malformed values.
    #[error("{message}")]
    InvalidRequest {
        /// Description of what is wrong with the request.
        message: String,
    },

    /// The answer at the cursor is blank.
    #[error("Answer to question {} must not be empty", index + 1)]
    EmptyAnswer {
        /// Zero-based question index.
        index: usize,
    },

    /// Module index is outside the course's module list.
    #[error("Module index out of bounds: {index} (course has {count} modules)")]
    ModuleOutOfBounds {
        /// Requested zero-based module index.
        index: usize,
        /// Number of modules in the course.
        count: usize,
    },

    // ========================================================================
    // Interview State Errors
    // ========================================================================
    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    /// Another call for the same logical operation is still outstanding.
    #[error("{operation} is already in progress")]
    Busy {
        /// The operation holding the single-flight slot.
        operation: String,
    },

    /// No interview session exists with the given id.
    #[error("Interview session not found: {id}")]
    SessionNotFound {
        /// The unknown session id.
        id: Uuid,
    },

    // ========================================================================
    // Reasoning Service Errors
    // ========================================================================
    /// The reasoning service returned an error (authentication, rate limiting, etc.).
    #[error("Reasoning service error ({kind}): {message}\n\nSuggestion: {suggestion}")]
    ReasoningApiError {
        /// The kind of API error.
        kind: ReasoningErrorKind,
        /// Detailed error message from the API.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The reasoning service replied with content that could not be used.
    #[error("{INVALID_AI_RESPONSE}: {detail}")]
    InvalidAiResponse {
        /// What was wrong with the reply.
        detail: String,
    },

    /// An outbound call did not settle within the configured timeout.
    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration in seconds.
        timeout_secs: u64,
    },

    /// A remote diagnostic service answered with `success: false`.
    #[error("{message}")]
    Rejected {
        /// The error message reported by the remote service.
        message: String,
    },

    /// A remote diagnostic service could not be reached.
    #[error("Diagnostic service unreachable: {message}")]
    ServiceUnreachable {
        /// Transport error description.
        message: String,
    },

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// The course does not exist.
    #[error("Course not found: {id}")]
    CourseNotFound {
        /// The unknown course id.
        id: Uuid,
    },

    /// No content store is configured.
    #[error("Content store is not available")]
    StoreUnavailable,

    /// The content store failed.
    #[error("Content store error: {0}")]
    Store(StoreError),

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A spawned task driving an outbound call panicked or was aborted.
    #[error("{operation} task failed: {message}")]
    TaskFailed {
        /// The operation the task was running.
        operation: String,
        /// The join error description.
        message: String,
    },
}

/// Categories of reasoning service errors for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for ReasoningErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl ReasoningErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check the GEMINI_API_KEY environment variable",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server => "Retry later; the reasoning service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::Other => "Check the reasoning provider's status page",
        }
    }

    /// Classifies an HTTP status returned by the reasoning service.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl From<StoreError> for AdaptiveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::CourseNotFound { id },
            other => Self::Store(other),
        }
    }
}

impl AdaptiveError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `ReasoningApiError` with automatic suggestion based on error kind.
    #[must_use]
    pub fn reasoning_api(kind: ReasoningErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::ReasoningApiError {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Creates a new `InvalidAiResponse` error.
    #[must_use]
    pub fn invalid_ai_response(detail: impl Into<String>) -> Self {
        Self::InvalidAiResponse {
            detail: detail.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>, timeout_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_secs,
        }
    }

    /// Creates a new `Busy` error.
    #[must_use]
    pub fn busy(operation: impl Into<String>) -> Self {
        Self::Busy {
            operation: operation.into(),
        }
    }

    /// Creates a new `Rejected` error carrying a remote service message.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error is transient and may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ReasoningApiError {
                kind: ReasoningErrorKind::RateLimit
                    | ReasoningErrorKind::Server
                    | ReasoningErrorKind::Network,
                ..
            } | Self::Timeout { .. }
                | Self::ServiceUnreachable { .. }
        )
    }

    /// Returns `true` if this error is caused by the caller's input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Returns the HTTP status used when this error is surfaced by the API.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. }
            | Self::EmptyAnswer { .. }
            | Self::ModuleOutOfBounds { .. } => StatusCode::BAD_REQUEST,
            Self::CourseNotFound { .. } | Self::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidStateTransition { .. } | Self::Busy { .. } => StatusCode::CONFLICT,
            Self::ReasoningApiError { .. }
            | Self::InvalidAiResponse { .. }
            | Self::Rejected { .. }
            | Self::ServiceUnreachable { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ConfigParseError { .. }
            | Self::ConfigValidationError { .. }
            | Self::Store(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::TaskFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a short message suitable for showing to the learner.
    ///
    /// Remote rejections are passed through verbatim; upstream failures
    /// collapse to a generic line without internal details.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message } => message.clone(),
            Self::InvalidAiResponse { .. } => INVALID_AI_RESPONSE.to_string(),
            Self::ReasoningApiError { kind, .. } => match kind {
                ReasoningErrorKind::Authentication => {
                    "The AI service rejected our credentials. Please check the API key.".to_string()
                }
                ReasoningErrorKind::RateLimit => {
                    "The AI service is busy right now. Please try again shortly.".to_string()
                }
                _ => "The AI service is unavailable. Please try again.".to_string(),
            },
            Self::Timeout { .. } => "The AI service took too long to answer. Please try again.".to_string(),
            Self::ServiceUnreachable { .. } => {
                "Network error. Please ensure the server is running.".to_string()
            }
            Self::Store(_) | Self::Io(_) | Self::Json(_) => {
                "Could not save your course. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}
