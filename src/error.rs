// src/error.rs
//! Typed errors for upstream fetches and the generative text source.
//!
//! Neither type is meant to cross the service boundary as a failure of the
//! whole request: fetchers fold `FetchError` into `FetchOutcome::Failure`,
//! and the analyst turns `GenerationError` into a degraded response.

use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("unexpected response shape: {0}")]
    Schema(String),
    #[error("source not configured: {0}")]
    NotConfigured(&'static str),
}

impl FetchError {
    pub fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(timeout)
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation transport error: {0}")]
    Transport(String),
    #[error("generation upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generation quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("generation stream cancelled")]
    Cancelled,
    #[error("malformed stream event: {0}")]
    Malformed(String),
    #[error("generative source disabled")]
    Disabled,
}

impl GenerationError {
    /// Classify an upstream failure message; quota markers win over the generic variant.
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        if status == Some(429) || looks_like_quota_error(message) {
            return GenerationError::QuotaExceeded(message.to_string());
        }
        match status {
            Some(s) => GenerationError::Status {
                status: s,
                body: message.to_string(),
            },
            None => GenerationError::Transport(message.to_string()),
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, GenerationError::QuotaExceeded(_))
    }
}

/// True when an error message carries a rate-limit marker.
///
/// Matches "429", "quota" (any case) and Gemini's "RESOURCE_EXHAUSTED". A
/// message that merely mentions the number 429 is a tolerated false positive.
pub fn looks_like_quota_error(message: &str) -> bool {
    message.contains("429")
        || message.to_ascii_lowercase().contains("quota")
        || message.contains("RESOURCE_EXHAUSTED")
}
