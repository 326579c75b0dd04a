//! Gemini `generateContent` client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::ReasoningConfig;
use crate::error::{AdaptiveError, ReasoningErrorKind, Result};
use crate::reasoning::{ReasoningRequest, ReasoningService};

/// Environment variable consulted when the configured one is unset.
pub const FALLBACK_API_KEY_ENV: &str = "GOOGLE_GEMINI_API_KEY";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    /// Concatenates the text parts of the first candidate.
    fn text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();
        Some(text)
    }
}

/// Reasoning service backed by the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// Creates a client with an explicit API key.
    #[must_use]
    pub fn new(
        api_base: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Creates a client from configuration, reading the key from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an authentication [`AdaptiveError::ReasoningApiError`] if
    /// neither the configured variable nor `GOOGLE_GEMINI_API_KEY` holds a
    /// non-blank key.
    pub fn from_config(config: &ReasoningConfig) -> Result<Self> {
        let api_key = [config.api_key_env.as_str(), FALLBACK_API_KEY_ENV]
            .into_iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
            .ok_or_else(|| {
                AdaptiveError::reasoning_api(
                    ReasoningErrorKind::Authentication,
                    format!("no API key found in {} or {FALLBACK_API_KEY_ENV}", config.api_key_env),
                )
            })?;
        Ok(Self::new(&config.api_base, &config.model, api_key))
    }

    /// Returns the model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the endpoint URL without the key.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl ReasoningService for GeminiClient {
    #[instrument(skip(self, request), fields(kind = %request.kind, model = %self.model))]
    async fn complete(&self, request: ReasoningRequest) -> Result<String> {
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part {
                    text: &request.prompt,
                }],
            }],
        };

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AdaptiveError::reasoning_api(ReasoningErrorKind::Network, e.without_url().to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Reasoning service returned an error");
            return Err(AdaptiveError::reasoning_api(
                ReasoningErrorKind::from_status(status.as_u16()),
                format!("HTTP {status}: {}", detail.chars().take(200).collect::<String>()),
            ));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| {
                AdaptiveError::invalid_ai_response(format!("unreadable reply body: {}", e.without_url()))
            })?;
        let text = parsed
            .text()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AdaptiveError::invalid_ai_response("reply has no text candidate"))?;

        debug!(reply_len = text.len(), "Reasoning reply received");
        Ok(text)
    }
}
