// src/lib.rs
// Public library surface for the binary and the integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;

// News fan-out: providers, dedup, interleaving and feed assembly
pub mod ingest;

// Chat analysis: streaming, resilient extraction and conversation history
pub mod analyze;

// Metric sources and the alert rules evaluated over them
pub mod alerts;
pub mod environment;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::cache::TtlCache;
pub use crate::config::Config;
