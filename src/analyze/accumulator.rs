// src/analyze/accumulator.rs
//! Assembles a streamed response into one string.
//!
//! Nothing is surfaced until the stream ends. If the stream errors or is
//! cancelled the partial buffer is dropped and the caller gets an error.

use std::time::Duration;

use futures::{Stream, StreamExt};

use crate::error::GenerationError;

#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buffer: String,
    complete: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Chunks after completion are ignored.
    pub fn push(&mut self, chunk: &str) {
        if !self.complete {
            self.buffer.push_str(chunk);
        }
    }

    /// Mark end-of-stream.
    pub fn complete(&mut self) {
        self.complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The assembled text, only once complete.
    pub fn into_text(self) -> Option<String> {
        self.complete.then_some(self.buffer)
    }
}

/// Drain `stream` into a single string.
pub async fn accumulate<S>(stream: S) -> Result<String, GenerationError>
where
    S: Stream<Item = Result<String, GenerationError>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut acc = StreamAccumulator::new();
    let mut chunks = 0usize;
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                acc.push(&chunk);
                chunks += 1;
            }
            Err(e) => {
                tracing::debug!(chunks, discarded = acc.len(), error = %e, "stream aborted");
                return Err(e);
            }
        }
    }
    acc.complete();
    tracing::debug!(chunks, bytes = acc.len(), "stream complete");
    acc.into_text().ok_or(GenerationError::Cancelled)
}

/// `accumulate` bounded by `limit`; expiry counts as cancellation.
pub async fn accumulate_within<S>(stream: S, limit: Duration) -> Result<String, GenerationError>
where
    S: Stream<Item = Result<String, GenerationError>>,
{
    match tokio::time::timeout(limit, accumulate(stream)).await {
        Ok(res) => res,
        Err(_) => Err(GenerationError::Cancelled),
    }
}
