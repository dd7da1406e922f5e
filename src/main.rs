//! terratrack binary entrypoint.
//! Loads configuration, installs tracing and the Prometheus recorder, and
//! serves the Axum router through Shuttle.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use terratrack::config::ai::AiConfig;
use terratrack::metrics::Metrics;
use terratrack::{router, AppState, Config};

/// Compact logs by default; `TERRATRACK_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("terratrack=info,warn"));
    let json = std::env::var("TERRATRACK_LOG_JSON").is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    // Shuttle may have installed a subscriber already.
    if let Err(e) = res {
        eprintln!("tracing already initialized: {e}");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::load().context("load configuration")?;
    let ai = AiConfig::load_or_env();
    tracing::info!(
        page_size = cfg.page_size,
        ai_enabled = ai.enabled,
        ai_provider = %ai.provider,
        "configuration loaded"
    );

    let state = AppState::from_config(&cfg, &ai);
    tracing::info!(sources = ?state.news.source_names(), "news sources ready");

    let mut app = router(state);
    match Metrics::init(&cfg) {
        Ok(m) => app = app.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    Ok(app.into())
}
