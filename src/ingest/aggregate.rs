// src/ingest/aggregate.rs
//! Concurrent fan-out over a list of sources.
//!
//! Every source is polled to completion (not fail-fast). Successful records are
//! concatenated in source-list order, so the merged set does not depend on
//! which source answered first.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metrics::counter;

use crate::error::FetchError;
use crate::ingest::types::{FetchOutcome, NewsQuery, Record, SourceFetcher};

/// Per-source result as seen by the aggregator.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: String,
    pub outcome: FetchOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct AggregateReport {
    pub records: Vec<Record>,
    pub sources: Vec<SourceReport>,
}

impl AggregateReport {
    pub fn succeeded(&self) -> usize {
        self.sources.iter().filter(|s| s.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.sources.len() - self.succeeded()
    }

    /// Every source failed (distinct from "all succeeded with zero records").
    /// An empty source list is not a failure.
    pub fn all_failed(&self) -> bool {
        !self.sources.is_empty() && self.succeeded() == 0
    }
}

async fn fetch_one(
    fetcher: &Arc<dyn SourceFetcher>,
    query: &NewsQuery,
    deadline: Option<Duration>,
) -> FetchOutcome {
    counter!("ingest_fetch_total").increment(1);
    match deadline {
        None => fetcher.fetch(query).await,
        Some(d) => match tokio::time::timeout(d, fetcher.fetch(query)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                counter!("ingest_provider_errors_total").increment(1);
                FetchOutcome::Failure(FetchError::Timeout(d))
            }
        },
    }
}

/// Dispatch `query` to every source concurrently and merge the successes.
///
/// `deadline` bounds the whole fan-out; sources still pending when it expires
/// are reported as `Failure(Timeout)` and their late results are discarded.
pub async fn aggregate(
    fetchers: &[Arc<dyn SourceFetcher>],
    query: &NewsQuery,
    deadline: Option<Duration>,
) -> AggregateReport {
    super::ensure_metrics_described();

    let outcomes = join_all(fetchers.iter().map(|f| fetch_one(f, query, deadline))).await;

    let mut report = AggregateReport::default();
    for (fetcher, outcome) in fetchers.iter().zip(outcomes) {
        match &outcome {
            FetchOutcome::Success(records) => report.records.extend(records.iter().cloned()),
            FetchOutcome::Failure(e) => {
                tracing::warn!(provider = fetcher.name(), error = %e, "source excluded from merge");
            }
        }
        report.sources.push(SourceReport {
            source: fetcher.name().to_string(),
            outcome,
        });
    }

    tracing::debug!(
        sources = report.sources.len(),
        succeeded = report.succeeded(),
        records = report.records.len(),
        "fan-out settled"
    );
    report
}
