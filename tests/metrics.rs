// tests/metrics.rs
//
// The Prometheus recorder is process-global, so this file holds a single test
// that installs it once and checks the exposition after real work.

use std::time::Duration;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use terratrack::config::Config;
use terratrack::environment::EnvironmentSources;
use terratrack::ingest::providers::http_client;
use terratrack::metrics::Metrics;

#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    let mut cfg = Config::default();
    cfg.endpoints.waqi = "http://127.0.0.1:9".into();
    cfg.fetch_timeout = Duration::from_millis(300);
    let metrics = Metrics::init(&cfg).expect("recorder installs once");

    // One failing metric source call.
    let env = EnvironmentSources::from_config(&cfg, http_client());
    assert!(env.waqi.by_coords(10.0, 10.0).await.is_err());

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "news_cache_ttl_secs",
        "emissions_cache_ttl_secs",
        "env_fetch_total",
        "env_fetch_errors_total",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}
