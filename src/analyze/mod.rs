// src/analyze/mod.rs
//! Chat/analysis pipeline: prompt → streamed chunks → accumulated text →
//! resilient extraction → `ParsedResponse`, with per-session history.

pub mod accumulator;
pub mod ai_adapter;
pub mod conversation;
pub mod extract;
pub mod fallback;
pub mod response;

use std::time::Duration;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::error::GenerationError;
use crate::ingest::anon_hash;

// Re-export convenient types.
pub use crate::analyze::ai_adapter::{DynSource, GenerativeSource, PromptMessage};
pub use crate::analyze::conversation::{Conversation, SessionStore};
pub use crate::analyze::extract::{extract, Extraction};
pub use crate::analyze::response::{ParsedResponse, Source, Visualization};

const SYSTEM_PROMPT: &str = "You are a climate and environmental data analyst. \
Respond with one JSON object of the form \
{\"content\": string (markdown, use \\n for newlines), \
\"sources\": [{\"title\", \"url\", \"type\", \"description\", \"publishedDate\", \"author\", \"reliability\"}], \
\"visualization\": null or {\"type\": \"line|bar|doughnut|scatter\", \"title\", \"description\", \
\"chartData\": {\"labels\": [], \"datasets\": [{\"label\", \"data\": []}]}, \"insights\": [], \"summary\": {}}}. \
Use the conversation history for follow-up questions.";

const PRIMER_REPLY: &str = "{\"content\": \"Ready to help with climate and environmental analysis.\", \"sources\": [], \"visualization\": null}";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "extract_tier_total",
            "Responses recovered, labeled by the extraction tier that succeeded."
        );
        describe_counter!("analysis_quota_fallback_total", "Quota fallbacks served.");
        describe_counter!("analysis_failures_total", "Analyses that ended in an error.");
    });
}

/// Prompt for `query` preceded by the primer and the session history.
pub fn build_messages(history: &Conversation, query: &str) -> Vec<PromptMessage> {
    let mut out = Vec::with_capacity(3 + history.len() * 2);
    out.push(PromptMessage::user(SYSTEM_PROMPT));
    out.push(PromptMessage::model(PRIMER_REPLY));
    for ex in history.iter() {
        out.push(PromptMessage::user(ex.user.clone()));
        let reply = serde_json::to_string(&ex.response).unwrap_or_default();
        out.push(PromptMessage::model(reply));
    }
    out.push(PromptMessage::user(query));
    out
}

/// Chat-style analyst over a generative source.
pub struct ClimateAnalyst {
    source: DynSource,
    sessions: SessionStore,
    stream_timeout: Duration,
}

impl ClimateAnalyst {
    pub fn new(source: DynSource, sessions: SessionStore, stream_timeout: Duration) -> Self {
        ensure_metrics_described();
        Self {
            source,
            sessions,
            stream_timeout,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn provider_name(&self) -> &'static str {
        self.source.name()
    }

    /// Answer `query` within `session`. Without a session the query runs
    /// against an empty history and nothing is recorded.
    ///
    /// Quota exhaustion yields the informational fallback. Any other stream
    /// failure (including cancellation) is returned as an error and nothing is
    /// recorded in the history.
    pub async fn analyze(
        &self,
        session: Option<&str>,
        query: &str,
        new_conversation: bool,
    ) -> Result<ParsedResponse, GenerationError> {
        let history = match session {
            Some(id) => {
                if new_conversation {
                    self.sessions.clear(id);
                }
                self.sessions.snapshot(id)
            }
            None => Conversation::new(1),
        };
        let messages = build_messages(&history, query);

        let text = match self.source.stream(&messages).await {
            Ok(stream) => accumulator::accumulate_within(stream, self.stream_timeout).await,
            Err(e) => Err(e),
        };
        let text = match text {
            Ok(t) => t,
            Err(e) => return self.degrade(query, e),
        };

        let extraction = extract(&text);
        let fell_back = extraction.is_fallback();
        let mut response = extraction.into_response();
        if fell_back && response.content.trim().is_empty() {
            response.content = fallback::APOLOGY.to_string();
        }

        tracing::info!(
            q = %anon_hash(query),
            provider = self.source.name(),
            history = history.len(),
            sources = response.sources.len(),
            fell_back,
            "analysis complete"
        );
        if let Some(id) = session {
            self.sessions.record(id, query, response.clone());
        }
        Ok(response)
    }

    fn degrade(&self, query: &str, e: GenerationError) -> Result<ParsedResponse, GenerationError> {
        if e.is_quota() {
            counter!("analysis_quota_fallback_total").increment(1);
            tracing::warn!(q = %anon_hash(query), error = %e, "generation quota exceeded; serving fallback");
            return Ok(fallback::quota_response(query));
        }
        counter!("analysis_failures_total").increment(1);
        tracing::warn!(q = %anon_hash(query), error = %e, "analysis failed");
        Err(e)
    }
}
