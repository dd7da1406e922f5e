// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Normalized article/record. `title` and `url` are always present (possibly empty).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
    pub author: Option<String>,
}

/// Result of one source fetch. A `Failure` never aborts a fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(Vec<Record>),
    Failure(FetchError),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            FetchOutcome::Success(v) => v,
            FetchOutcome::Failure(_) => Vec::new(),
        }
    }
}

impl From<Result<Vec<Record>, FetchError>> for FetchOutcome {
    fn from(r: Result<Vec<Record>, FetchError>) -> Self {
        match r {
            Ok(v) => FetchOutcome::Success(v),
            Err(e) => FetchOutcome::Failure(e),
        }
    }
}

/// What to ask a news source for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsQuery {
    pub text: String,
    /// Two-letter region hint (e.g. "in", "us").
    pub country: Option<String>,
    pub page_size: u32,
    /// Comma separated domain allow-list (NewsAPI only).
    pub domains: Option<String>,
    /// When set, sources that support it hit their top-headlines endpoint.
    pub category: Option<String>,
}

impl NewsQuery {
    pub fn search(text: impl Into<String>, page_size: u32) -> Self {
        Self {
            text: text.into(),
            country: None,
            page_size,
            domains: None,
            category: None,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        let c = country.into();
        self.country = (!c.trim().is_empty()).then_some(c);
        self
    }

    pub fn with_domains(mut self, domains: impl Into<String>) -> Self {
        self.domains = Some(domains.into());
        self
    }

    pub fn headlines(category: impl Into<String>, country: impl Into<String>, page_size: u32) -> Self {
        Self {
            text: String::new(),
            country: Some(country.into()),
            page_size,
            domains: None,
            category: Some(category.into()),
        }
    }

    /// Stable key fragment used by caching fetchers.
    pub fn cache_key(&self) -> String {
        format!(
            "q={}|c={}|n={}|d={}|cat={}",
            self.text,
            self.country.as_deref().unwrap_or_default(),
            self.page_size,
            self.domains.as_deref().unwrap_or_default(),
            self.category.as_deref().unwrap_or_default()
        )
    }
}

/// One upstream news adapter. Implementations must be total: transport
/// errors, timeouts and schema surprises come back as `FetchOutcome::Failure`.
#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, query: &NewsQuery) -> FetchOutcome;
    fn name(&self) -> &str;

    /// Whether `query.category` is honored (a top-headlines endpoint exists).
    fn supports_headlines(&self) -> bool {
        false
    }
}
