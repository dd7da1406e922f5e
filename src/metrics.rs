// src/metrics.rs
//! Prometheus recorder and the `/metrics` route.

use anyhow::Context;
use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::Config;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global recorder and publish the configured cache ttls as
    /// static gauges. Fails if a recorder is already installed.
    pub fn init(cfg: &Config) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("install prometheus recorder")?;

        gauge!("news_cache_ttl_secs").set(cfg.news_cache_ttl.as_secs_f64());
        gauge!("emissions_cache_ttl_secs").set(cfg.emissions_cache_ttl.as_secs_f64());

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
