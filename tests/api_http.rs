// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /news (stub source)
// - GET /news/location (validation)
// - POST /chat, DELETE /chat/{session_id}
// - GET /alerts (coordinate validation)
// - GET /air (upstream down → 502, missing target → 400)
// - GET /emissions, /geocode, /air/history, /weather/forecast (validation)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use terratrack::analyze::ai_adapter::{DisabledSource, DynSource, MockSource};
use terratrack::analyze::SessionStore;
use terratrack::config::Config;
use terratrack::environment::EnvironmentSources;
use terratrack::error::GenerationError;
use terratrack::ingest::feed::NewsService;
use terratrack::ingest::providers::http_client;
use terratrack::ingest::types::{FetchOutcome, NewsQuery, Record, SourceFetcher};
use terratrack::{router, AppState};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

struct OneStory;

#[async_trait]
impl SourceFetcher for OneStory {
    async fn fetch(&self, _q: &NewsQuery) -> FetchOutcome {
        FetchOutcome::Success(vec![Record {
            title: "Monsoon floods displace thousands in Assam".into(),
            url: "https://example.org/assam".into(),
            source_name: "Example Wire".into(),
            ..Record::default()
        }])
    }
    fn name(&self) -> &str {
        "one-story"
    }
}

fn offline_config() -> Config {
    let mut cfg = Config::default();
    for ep in [
        &mut cfg.endpoints.waqi,
        &mut cfg.endpoints.openweather,
        &mut cfg.endpoints.owid,
        &mut cfg.endpoints.nominatim,
    ] {
        *ep = "http://127.0.0.1:9".into();
    }
    cfg.fetch_timeout = Duration::from_millis(300);
    cfg
}

fn test_router(source: DynSource) -> Router {
    let cfg = offline_config();
    let news = NewsService::new(vec![Arc::new(OneStory)], &cfg);
    let env = EnvironmentSources::from_config(&cfg, http_client());
    let state = AppState::from_parts(news, env, source, SessionStore::new(10), Duration::from_secs(5));
    router(state)
}

fn mock_router() -> Router {
    test_router(Arc::new(MockSource::chunks([
        "{\"content\":\"Mumbai ",
        "AQI is high\",\"sources\":[],\"visualization\":null}",
    ])))
}

async fn read_json(resp: shuttle_axum::axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

fn post_json(uri: &str, payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

#[tokio::test]
async fn health_reports_sources_and_provider() {
    let resp = mock_router().oneshot(get("/health")).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["status"], "ok");
    assert_eq!(v["news_sources"], json!(["one-story"]));
    assert_eq!(v["ai_provider"], "mock");
}

#[tokio::test]
async fn news_feed_has_counts_and_status() {
    let resp = mock_router().oneshot(get("/news?page_size=5")).await.expect("oneshot /news");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["status"], "ok");
    assert_eq!(v["totalResults"], 1);
    assert_eq!(v["articles"][0]["sourceName"], "Example Wire");
    assert!(v.get("regionalCount").is_some());
}

#[tokio::test]
async fn location_news_requires_location() {
    let resp = mock_router()
        .oneshot(get("/news/location?location=%20"))
        .await
        .expect("oneshot /news/location");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = read_json(resp).await;
    assert!(v["error"].as_str().unwrap().contains("location"));
}

#[tokio::test]
async fn chat_returns_parsed_response_and_session_can_be_cleared() {
    let app = mock_router();

    let resp = app
        .clone()
        .oneshot(post_json("/chat", json!({"query": "Mumbai air quality", "session_id": "abc"})))
        .await
        .expect("oneshot /chat");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(
        v,
        json!({"content": "Mumbai AQI is high", "sources": [], "visualization": null})
    );

    let del = |uri: &str| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .expect("build DELETE")
    };
    let resp = app.clone().oneshot(del("/chat/abc")).await.expect("oneshot delete");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = app.oneshot(del("/chat/abc")).await.expect("oneshot delete again");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chat_rejects_blank_query() {
    let resp = mock_router()
        .oneshot(post_json("/chat", json!({"query": "   "})))
        .await
        .expect("oneshot /chat");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_quota_serves_fallback_and_disabled_is_503() {
    let quota = test_router(Arc::new(MockSource::failing(GenerationError::QuotaExceeded(
        "429 RESOURCE_EXHAUSTED".into(),
    ))));
    let resp = quota
        .oneshot(post_json("/chat", json!({"query": "breakdown of Delhi pollution"})))
        .await
        .expect("oneshot /chat");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert!(v["content"].as_str().unwrap().contains("Air Quality in Delhi"));
    assert_eq!(v["visualization"]["type"], "line");

    let disabled = test_router(Arc::new(DisabledSource));
    let resp = disabled
        .oneshot(post_json("/chat", json!({"query": "hello"})))
        .await
        .expect("oneshot /chat");
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn alerts_validate_coordinates() {
    let resp = mock_router()
        .oneshot(get("/alerts?lat=123&lon=0"))
        .await
        .expect("oneshot /alerts");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn air_reports_upstream_failure_as_bad_gateway() {
    let resp = mock_router()
        .oneshot(get("/air?lat=19.07&lon=72.87"))
        .await
        .expect("oneshot /air");
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn anonymous_chats_do_not_share_history() {
    let app = mock_router();
    for q in ["alice private question", "bob question"] {
        let resp = app
            .clone()
            .oneshot(post_json("/chat", json!({ "query": q })))
            .await
            .expect("oneshot /chat");
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let v = read_json(app.clone().oneshot(get("/health")).await.expect("oneshot /health")).await;
    assert_eq!(v["sessions"], 0);

    let resp = app
        .clone()
        .oneshot(post_json("/chat", json!({"query": "q", "session_id": "named"})))
        .await
        .expect("oneshot /chat");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(app.oneshot(get("/health")).await.expect("oneshot /health")).await;
    assert_eq!(v["sessions"], 1);
}

#[tokio::test]
async fn metric_routes_validate_input() {
    let app = mock_router();
    for uri in [
        "/air",
        "/air?lat=10",
        "/emissions?country=India&dataset=not-a-chart",
        "/geocode?q=%20",
        "/air/history?lat=1&lon=1&start=10&end=5",
        "/weather/forecast?lat=91&lon=0",
    ] {
        let resp = app.clone().oneshot(get(uri)).await.expect("oneshot");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }

    // No OpenWeather key in the offline config.
    let resp = app
        .oneshot(get("/weather/forecast?lat=1&lon=2"))
        .await
        .expect("oneshot /weather/forecast");
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
