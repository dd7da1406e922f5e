// src/api.rs
//! HTTP surface: news feeds, chat analysis, alerts and raw metric lookups
//! (air quality, forecasts, emissions datasets and place search).

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shuttle_axum::axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::alerts::AlertService;
use crate::analyze::ai_adapter::{build_source, DynSource};
use crate::analyze::{ClimateAnalyst, SessionStore};
use crate::cache::TtlCache;
use crate::config::ai::AiConfig;
use crate::config::Config;
use crate::environment::{aqi_info, pollutant_details, AirReading, Dataset, EnvironmentSources};
use crate::error::{FetchError, GenerationError};
use crate::ingest::feed::NewsService;
use crate::ingest::providers::http_client;

#[derive(Clone)]
pub struct AppState {
    pub news: Arc<NewsService>,
    pub analyst: Arc<ClimateAnalyst>,
    pub env: Arc<EnvironmentSources>,
    pub alerts: Arc<AlertService>,
}

impl AppState {
    /// Wire every service from configuration with one shared HTTP client.
    pub fn from_config(cfg: &Config, ai: &AiConfig) -> Self {
        let client = http_client();
        let news = NewsService::from_config(cfg, client.clone(), TtlCache::new());
        let env = EnvironmentSources::from_config(cfg, client);
        let ai = ai.clone().with_fallback_key(cfg.keys.gemini.as_deref());
        let source = build_source(&ai, &cfg.endpoints.gemini);
        let timeout = Duration::from_secs(ai.stream_timeout_secs);
        let sessions = SessionStore::with_limits(cfg.history_cap, cfg.max_sessions, cfg.session_idle_ttl);
        Self::from_parts(news, env, source, sessions, timeout)
    }

    pub fn from_parts(
        news: NewsService,
        env: EnvironmentSources,
        source: DynSource,
        sessions: SessionStore,
        stream_timeout: Duration,
    ) -> Self {
        let news = Arc::new(news);
        let env = Arc::new(env);
        Self {
            analyst: Arc::new(ClimateAnalyst::new(source, sessions, stream_timeout)),
            alerts: Arc::new(AlertService::new(Arc::clone(&env), Arc::clone(&news))),
            news,
            env,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/news", get(news))
        .route("/news/headlines", get(headlines))
        .route("/news/regional", get(regional))
        .route("/news/location", get(news_by_location))
        .route("/chat", post(chat))
        .route("/chat/{session_id}", delete(clear_chat))
        .route("/alerts", get(alerts))
        .route("/air", get(air))
        .route("/air/forecast", get(air_forecast))
        .route("/air/history", get(air_history))
        .route("/weather/forecast", get(weather_forecast))
        .route("/emissions", get(emissions))
        .route("/geocode", get(geocode))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ------------------------------------------------------------
// Errors
// ------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Upstream(FetchError),
    Generation(GenerationError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Upstream(e @ FetchError::NotConfigured(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::Upstream(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ApiError::Generation(e @ GenerationError::Disabled) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::Generation(GenerationError::Cancelled) => (
                StatusCode::GATEWAY_TIMEOUT,
                GenerationError::Cancelled.to_string(),
            ),
            ApiError::Generation(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
        };
        (status, Json(ErrorBody { error: msg })).into_response()
    }
}

// ------------------------------------------------------------
// Handlers
// ------------------------------------------------------------

#[derive(Serialize)]
struct Health {
    status: &'static str,
    news_sources: Vec<String>,
    ai_provider: &'static str,
    sessions: usize,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        news_sources: state.news.source_names(),
        ai_provider: state.analyst.provider_name(),
        sessions: state.analyst.sessions().sessions(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct NewsParams {
    country: Option<String>,
    page_size: Option<usize>,
}

async fn news(State(state): State<AppState>, Query(p): Query<NewsParams>) -> impl IntoResponse {
    let page_size = p.page_size.unwrap_or_else(|| state.news.default_page_size());
    Json(state.news.environmental_news(p.country.as_deref(), page_size).await)
}

#[derive(Debug, Default, Deserialize)]
struct HeadlineParams {
    country: Option<String>,
}

async fn headlines(State(state): State<AppState>, Query(p): Query<HeadlineParams>) -> impl IntoResponse {
    let country = p.country.unwrap_or_else(|| "us".to_string());
    Json(state.news.top_headlines(&country).await)
}

async fn regional(State(state): State<AppState>, Query(p): Query<NewsParams>) -> impl IntoResponse {
    let page_size = p.page_size.unwrap_or(10);
    Json(state.news.regional_news(page_size).await)
}

#[derive(Debug, Default, Deserialize)]
struct LocationParams {
    location: Option<String>,
    page_size: Option<usize>,
}

async fn news_by_location(
    State(state): State<AppState>,
    Query(p): Query<LocationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let location = p
        .location
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing 'location'".into()))?;
    let page_size = p.page_size.unwrap_or(5);
    Ok(Json(state.news.news_by_location(&location, page_size).await))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    new_conversation: bool,
}

async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Result<impl IntoResponse, ApiError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("empty query".into()));
    }
    // No id means a one-off question with no shared history.
    let session = req.session_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let response = state
        .analyst
        .analyze(session, query, req.new_conversation)
        .await
        .map_err(ApiError::Generation)?;
    Ok(Json(response))
}

async fn clear_chat(State(state): State<AppState>, Path(session_id): Path<String>) -> StatusCode {
    if state.analyst.sessions().clear(&session_id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Deserialize)]
struct CoordParams {
    lat: f64,
    lon: f64,
    #[serde(default)]
    location: Option<String>,
}

fn check_coords(lat: f64, lon: f64) -> Result<(), ApiError> {
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("coordinates out of range: {lat}, {lon}")))
    }
}

async fn alerts(State(state): State<AppState>, Query(p): Query<CoordParams>) -> Result<impl IntoResponse, ApiError> {
    check_coords(p.lat, p.lon)?;
    let bundle = state
        .alerts
        .comprehensive_alerts(p.lat, p.lon, p.location.as_deref())
        .await;
    Ok(Json(bundle))
}

#[derive(Debug, Default, Deserialize)]
struct AirParams {
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
}

fn waqi_body(reading: AirReading) -> serde_json::Value {
    serde_json::json!({
        "source": "waqi",
        "info": reading.aqi.map(aqi_info),
        "pollutants": pollutant_details(&reading),
        "reading": reading,
    })
}

/// Station reading by city name or coordinates. For coordinates, OpenWeather's
/// pollutant sample is served when WAQI is unavailable.
async fn air(State(state): State<AppState>, Query(p): Query<AirParams>) -> Result<impl IntoResponse, ApiError> {
    if let Some(city) = p.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        let reading = state.env.waqi.by_city(city).await.map_err(ApiError::Upstream)?;
        return Ok(Json(waqi_body(reading)));
    }
    let (Some(lat), Some(lon)) = (p.lat, p.lon) else {
        return Err(ApiError::BadRequest("expected 'city' or 'lat' and 'lon'".into()));
    };
    check_coords(lat, lon)?;
    let waqi_err = match state.env.waqi.by_coords(lat, lon).await {
        Ok(reading) => return Ok(Json(waqi_body(reading))),
        Err(e) => e,
    };
    match state.env.weather.air_pollution(lat, lon).await {
        Ok(air) => Ok(Json(serde_json::json!({
            "source": "openweather",
            "label": air.label(),
            "reading": air,
        }))),
        Err(e) => {
            tracing::debug!(error = %e, "openweather air fallback failed");
            Err(ApiError::Upstream(waqi_err))
        }
    }
}

async fn air_forecast(
    State(state): State<AppState>,
    Query(p): Query<CoordParams>,
) -> Result<impl IntoResponse, ApiError> {
    check_coords(p.lat, p.lon)?;
    let steps = state
        .env
        .weather
        .air_forecast(p.lat, p.lon)
        .await
        .map_err(ApiError::Upstream)?;
    Ok(Json(steps))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    lat: f64,
    lon: f64,
    start: i64,
    end: i64,
}

async fn air_history(
    State(state): State<AppState>,
    Query(p): Query<HistoryParams>,
) -> Result<impl IntoResponse, ApiError> {
    check_coords(p.lat, p.lon)?;
    if p.start > p.end {
        return Err(ApiError::BadRequest("'start' is after 'end'".into()));
    }
    let samples = state
        .env
        .weather
        .air_history(p.lat, p.lon, p.start, p.end)
        .await
        .map_err(ApiError::Upstream)?;
    Ok(Json(samples))
}

async fn weather_forecast(
    State(state): State<AppState>,
    Query(p): Query<CoordParams>,
) -> Result<impl IntoResponse, ApiError> {
    check_coords(p.lat, p.lon)?;
    let steps = state
        .env
        .weather
        .forecast(p.lat, p.lon)
        .await
        .map_err(ApiError::Upstream)?;
    Ok(Json(steps))
}

#[derive(Debug, Deserialize)]
struct EmissionsParams {
    country: String,
    /// Grapher slug; without it the headline profile is returned.
    #[serde(default)]
    dataset: Option<String>,
}

async fn emissions(
    State(state): State<AppState>,
    Query(p): Query<EmissionsParams>,
) -> Result<Response, ApiError> {
    if p.country.trim().is_empty() {
        return Err(ApiError::BadRequest("empty country".into()));
    }
    let Some(slug) = p.dataset.as_deref().map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(Json(state.env.emissions.profile(&p.country).await).into_response());
    };
    let ds = Dataset::from_slug(slug).ok_or_else(|| ApiError::BadRequest(format!("unknown dataset '{slug}'")))?;
    match state.env.emissions.series(ds, &p.country).await.map_err(ApiError::Upstream)? {
        Some(series) => Ok(Json(serde_json::json!({
            "dataset": ds.slug(),
            "latest": series.latest(),
            "series": series,
        }))
        .into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeParams {
    q: String,
}

async fn geocode(State(state): State<AppState>, Query(p): Query<GeocodeParams>) -> Result<Response, ApiError> {
    if p.q.trim().is_empty() {
        return Err(ApiError::BadRequest("empty 'q'".into()));
    }
    match state.env.geocoder.search(&p.q).await.map_err(ApiError::Upstream)? {
        Some(place) => Ok(Json(place).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}
