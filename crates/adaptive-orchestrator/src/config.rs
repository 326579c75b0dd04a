//! Configuration types for the Adaptive diagnostic orchestrator.
//!
//! This module provides all configuration structures used to control the
//! orchestrator, including the reasoning service endpoint, retry policy,
//! interview fallbacks, and the course store backend.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AdaptiveError, Result};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "adaptive.json";

/// Default interview language.
pub const DEFAULT_LANGUAGE: &str = "English";

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_model() -> String {
    "gemini-flash-latest".to_string()
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

/// Default per-attempt timeout for reasoning calls, in seconds.
const fn default_request_timeout() -> u64 {
    60
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff() -> u64 {
    500
}

const fn default_max_backoff() -> u64 {
    8000
}

/// Default cap on generated follow-up questions.
const fn default_max_followups() -> usize {
    5
}

/// Default idle time before an unfinished session is evicted.
const fn default_session_ttl() -> u64 {
    3600
}

fn default_store_path() -> String {
    ".adaptive/courses.json".to_string()
}

/// Main configuration for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Default language for questions and generated content.
    #[serde(default = "default_language")]
    pub language: String,

    /// Reasoning service endpoint settings.
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Retry policy for reasoning calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Interview flow settings.
    #[serde(default)]
    pub interview: InterviewConfig,

    /// Course store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: default_language(),
            reasoning: ReasoningConfig::default(),
            retry: RetryConfig::default(),
            interview: InterviewConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `adaptive.json` in the current directory. If found, loads and
    /// validates the configuration. If not found, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            AdaptiveError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `adaptive.json` in a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `AdaptiveError::ConfigParseError` if the file exists but contains
    /// invalid JSON or invalid enum values.
    ///
    /// Returns `AdaptiveError::ConfigValidationError` if the configuration values
    /// are invalid (e.g., zero attempts, empty model name).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(AdaptiveError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| AdaptiveError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `AdaptiveError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(AdaptiveError::config_validation(
                "language must not be empty",
                "Set language to e.g. \"English\" in your adaptive.json",
            ));
        }

        if self.reasoning.model.trim().is_empty() {
            return Err(AdaptiveError::config_validation(
                "reasoning.model must not be empty",
                "Set reasoning.model to a model name such as \"gemini-flash-latest\"",
            ));
        }

        if self.reasoning.api_base.trim().is_empty() {
            return Err(AdaptiveError::config_validation(
                "reasoning.apiBase must not be empty",
                "Set reasoning.apiBase to the reasoning service base URL",
            ));
        }

        if self.reasoning.request_timeout_secs == 0 {
            return Err(AdaptiveError::config_validation(
                "reasoning.requestTimeoutSecs must be greater than 0",
                "Set reasoning.requestTimeoutSecs to at least 1 second in your adaptive.json",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(AdaptiveError::config_validation(
                "retry.maxAttempts must be greater than 0",
                "Set retry.maxAttempts to at least 1 in your adaptive.json",
            ));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(AdaptiveError::config_validation(
                "retry.initialBackoffMs must not exceed retry.maxBackoffMs",
                "Lower retry.initialBackoffMs or raise retry.maxBackoffMs in your adaptive.json",
            ));
        }

        if self.interview.max_followups == 0 {
            return Err(AdaptiveError::config_validation(
                "interview.maxFollowups must be greater than 0",
                "Set interview.maxFollowups to at least 1 in your adaptive.json",
            ));
        }

        if self.interview.session_ttl_secs == 0 {
            return Err(AdaptiveError::config_validation(
                "interview.sessionTtlSecs must be greater than 0",
                "Set interview.sessionTtlSecs to at least 1 second in your adaptive.json",
            ));
        }

        if self.store.backend == StoreBackend::File && self.store.path.trim().is_empty() {
            return Err(AdaptiveError::config_validation(
                "store.path must not be empty when store.backend is \"file\"",
                "Provide a store.path or use \"memory\" as store.backend",
            ));
        }

        Ok(())
    }
}

/// Reasoning service endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningConfig {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the generative API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-attempt timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ReasoningConfig {
    /// Returns the per-attempt timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Bounded exponential backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for any single delay.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Interview flow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewConfig {
    /// What to do when follow-up generation fails or yields nothing.
    #[serde(default)]
    pub followup_fallback: FollowupFallback,

    /// Maximum number of follow-up questions kept from one generation.
    #[serde(default = "default_max_followups")]
    pub max_followups: usize,

    /// Seconds a session may sit idle (or failed) before it is evicted.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

impl InterviewConfig {
    /// Returns the idle session lifetime as a [`Duration`].
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            followup_fallback: FollowupFallback::default(),
            max_followups: default_max_followups(),
            session_ttl_secs: default_session_ttl(),
        }
    }
}

/// Behavior when follow-up generation fails or returns no questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FollowupFallback {
    /// Record a notice and submit the five general answers (default).
    #[default]
    SubmitGeneral,
    /// Fail the session; advancing again retries generation.
    Abort,
}

impl FollowupFallback {
    /// Parses a string into a `FollowupFallback`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "submitgeneral" => Some(Self::SubmitGeneral),
            "abort" => Some(Self::Abort),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for FollowupFallback {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid follow-up fallback '{s}': expected one of 'submitGeneral', 'abort'"
            ))
        })
    }
}

impl Serialize for FollowupFallback {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::SubmitGeneral => "submitGeneral",
            Self::Abort => "abort",
        };
        serializer.serialize_str(s)
    }
}

/// Course store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Which store implementation to use.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Path of the JSON store file for the `file` backend.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

/// Course store implementations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process memory; nothing survives a restart.
    Memory,
    /// A JSON file on disk (default).
    #[default]
    File,
}

impl StoreBackend {
    /// Parses a string into a `StoreBackend`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for StoreBackend {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid store backend '{s}': expected one of 'memory', 'file'"
            ))
        })
    }
}

impl Serialize for StoreBackend {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Memory => "memory",
            Self::File => "file",
        };
        serializer.serialize_str(s)
    }
}
