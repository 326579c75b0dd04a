//! Where an interview sends its outbound calls.
//!
//! The server drives interviews against the in-process
//! [`DiagnosticService`]; the terminal client drives them against a running
//! server through [`HttpBackend`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::diagnostic::{FollowUpRequest, SubmissionOutcome, SubmissionRequest};
use crate::error::{AdaptiveError, Result};
use crate::service::DiagnosticService;

/// The two calls an interview makes.
#[async_trait]
pub trait DiagnosticBackend: Send + Sync {
    /// Generates follow-up questions; the list may be empty.
    async fn follow_up_questions(&self, request: &FollowUpRequest) -> Result<Vec<String>>;

    /// Submits a completed interview.
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionOutcome>;
}

#[async_trait]
impl DiagnosticBackend for DiagnosticService {
    async fn follow_up_questions(&self, request: &FollowUpRequest) -> Result<Vec<String>> {
        Self::follow_up_questions(self, request).await
    }

    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionOutcome> {
        Self::submit(self, request).await
    }
}

// ============================================================================
// HTTP Backend
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct QuestionsBody {
    #[serde(default)]
    questions: Vec<String>,
}

/// Calls the diagnostic endpoints of a running server.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Creates a backend for the server at `base_url` (e.g. `http://127.0.0.1:3000`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns the server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AdaptiveError::ServiceUnreachable {
                message: e.to_string(),
            })?;

        let status = response.status();
        let payload: Value = response.json().await.map_err(|e| {
            warn!(%url, status = status.as_u16(), error = %e, "Unreadable response body");
            AdaptiveError::rejected(format!("Request failed with status {}", status.as_u16()))
        })?;
        debug!(%url, status = status.as_u16(), "Diagnostic service replied");
        parse_envelope(status.as_u16(), payload)
    }
}

/// Unwraps a `{success, ...}` envelope.
///
/// `success: false` (or a missing flag on an error status) becomes
/// [`AdaptiveError::Rejected`] carrying the server's `error` message.
fn parse_envelope<T: DeserializeOwned>(status: u16, payload: Value) -> Result<T> {
    let success = payload
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or((200..300).contains(&status));
    if !success {
        let message = payload
            .get("error")
            .and_then(Value::as_str)
            .map_or_else(|| format!("Request failed with status {status}"), ToString::to_string);
        return Err(AdaptiveError::rejected(message));
    }
    serde_json::from_value(payload).map_err(|e| AdaptiveError::rejected(format!("Unexpected response: {e}")))
}

#[async_trait]
impl DiagnosticBackend for HttpBackend {
    async fn follow_up_questions(&self, request: &FollowUpRequest) -> Result<Vec<String>> {
        let body: QuestionsBody = self.post("/api/diagnostic/questions", request).await?;
        Ok(body.questions)
    }

    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionOutcome> {
        self.post("/api/diagnostic", request).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_envelope_rejection_surfaces_message() {
        let err = parse_envelope::<QuestionsBody>(500, json!({"success": false, "error": "x"})).unwrap_err();
        assert!(matches!(&err, AdaptiveError::Rejected { message } if message == "x"));
        assert_eq!(err.user_message(), "x");
    }

    #[test]
    fn test_envelope_without_flag_uses_status() {
        let err = parse_envelope::<QuestionsBody>(400, json!({"error": "Missing topic or skillLevel"}))
            .unwrap_err();
        assert_eq!(err.user_message(), "Missing topic or skillLevel");

        let err = parse_envelope::<QuestionsBody>(502, json!({})).unwrap_err();
        assert_eq!(err.user_message(), "Request failed with status 502");
    }

    #[test]
    fn test_envelope_success() {
        let body: QuestionsBody =
            parse_envelope(200, json!({"success": true, "questions": ["Q6", "Q7"]})).unwrap();
        assert_eq!(body.questions, vec!["Q6", "Q7"]);
    }

    #[test]
    fn test_base_url_is_normalized() {
        let backend = HttpBackend::new("http://127.0.0.1:3000/");
        assert_eq!(backend.base_url(), "http://127.0.0.1:3000");
    }
}
