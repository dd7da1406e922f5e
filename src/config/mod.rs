// src/config/mod.rs
//! Process configuration: API keys, upstream base URLs, timeouts, cache TTLs
//! and the news mixing policy.
//!
//! Resolution order (later wins):
//! 1) built-in defaults
//! 2) TOML file at `$TERRATRACK_CONFIG` or `config/terratrack.toml` (if present)
//! 3) environment variables

pub mod ai;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::ingest::classify::DEFAULT_REGIONAL_INDICATORS;
use crate::ingest::interleave::InterleavePolicy;

pub const ENV_CONFIG_PATH: &str = "TERRATRACK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/terratrack.toml";

/// Upstream API keys. `None` disables the corresponding source.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub news_api: Option<String>,
    pub gnews: Option<String>,
    pub newsdata: Option<String>,
    pub currents: Option<String>,
    pub waqi_token: String,
    pub openweather: Option<String>,
    pub openaq: Option<String>,
    pub gemini: Option<String>,
}

/// Base URLs, overridable so tests can point fetchers at a local server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub news_api: String,
    pub gnews: String,
    pub newsdata: String,
    pub currents: String,
    pub waqi: String,
    pub openweather: String,
    pub openaq: String,
    pub owid: String,
    pub nominatim: String,
    pub gemini: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            news_api: "https://newsapi.org/v2".into(),
            gnews: "https://gnews.io/api/v4".into(),
            newsdata: "https://newsdata.io/api/1".into(),
            currents: "https://api.currentsapi.services/v1".into(),
            waqi: "https://api.waqi.info".into(),
            openweather: "https://api.openweathermap.org/data/2.5".into(),
            openaq: "https://api.openaq.org/v2".into(),
            owid: "https://ourworldindata.org/grapher".into(),
            nominatim: "https://nominatim.openstreetmap.org".into(),
            gemini: "https://generativelanguage.googleapis.com/v1beta".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub keys: ApiKeys,
    pub endpoints: Endpoints,
    /// Per-call upstream timeout.
    pub fetch_timeout: Duration,
    /// Zero means "always re-fetch".
    pub news_cache_ttl: Duration,
    pub emissions_cache_ttl: Duration,
    pub air_cache_ttl: Duration,
    pub interleave: InterleavePolicy,
    pub page_size: usize,
    pub history_cap: usize,
    /// Chat sessions kept at once, and how long an idle one survives.
    pub max_sessions: usize,
    pub session_idle_ttl: Duration,
    /// Optional deadline for a whole fan-out; `None` waits for every source.
    pub fanout_deadline: Option<Duration>,
    pub regional_indicators: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keys: ApiKeys {
                waqi_token: "demo".into(),
                ..ApiKeys::default()
            },
            endpoints: Endpoints::default(),
            fetch_timeout: Duration::from_secs(5),
            news_cache_ttl: Duration::from_secs(10 * 60),
            emissions_cache_ttl: Duration::from_secs(60 * 60),
            air_cache_ttl: Duration::ZERO,
            interleave: InterleavePolicy::default(),
            page_size: 15,
            history_cap: 10,
            max_sessions: 1_000,
            session_idle_ttl: Duration::from_secs(30 * 60),
            fanout_deadline: None,
            regional_indicators: DEFAULT_REGIONAL_INDICATORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Optional overlay read from TOML. Every field may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    fetch_timeout_ms: Option<u64>,
    news_cache_ttl_secs: Option<u64>,
    emissions_cache_ttl_secs: Option<u64>,
    air_cache_ttl_secs: Option<u64>,
    interleave_ratio: Option<f64>,
    interleave_window: Option<usize>,
    page_size: Option<usize>,
    history_cap: Option<usize>,
    max_sessions: Option<usize>,
    session_idle_secs: Option<u64>,
    fanout_deadline_ms: Option<u64>,
    regional_indicators: Option<Vec<String>>,
    endpoints: Option<FileEndpoints>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileEndpoints {
    news_api: Option<String>,
    gnews: Option<String>,
    newsdata: Option<String>,
    currents: Option<String>,
    waqi: Option<String>,
    openweather: Option<String>,
    openaq: Option<String>,
    owid: Option<String>,
    nominatim: Option<String>,
    gemini: Option<String>,
}

impl Config {
    /// Defaults + optional TOML file + env. Missing file is not an error;
    /// an unreadable or malformed one is.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(path) = config_path()? {
            let file = load_file(&path)?;
            cfg.apply_file(file);
        }
        cfg.apply_env();
        Ok(cfg)
    }

    /// Defaults + env only.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(s).context("parsing terratrack config toml")?;
        let mut cfg = Self::default();
        cfg.apply_file(file);
        Ok(cfg)
    }

    fn apply_file(&mut self, f: FileConfig) {
        if let Some(ms) = f.fetch_timeout_ms {
            self.fetch_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(s) = f.news_cache_ttl_secs {
            self.news_cache_ttl = Duration::from_secs(s);
        }
        if let Some(s) = f.emissions_cache_ttl_secs {
            self.emissions_cache_ttl = Duration::from_secs(s);
        }
        if let Some(s) = f.air_cache_ttl_secs {
            self.air_cache_ttl = Duration::from_secs(s);
        }
        let ratio = f.interleave_ratio.unwrap_or(self.interleave.ratio);
        let window = f.interleave_window.unwrap_or(self.interleave.window);
        self.interleave = InterleavePolicy::new(ratio, window);
        if let Some(n) = f.page_size {
            self.page_size = n;
        }
        if let Some(n) = f.history_cap {
            self.history_cap = n.max(1);
        }
        if let Some(n) = f.max_sessions {
            self.max_sessions = n.max(1);
        }
        if let Some(s) = f.session_idle_secs {
            self.session_idle_ttl = Duration::from_secs(s);
        }
        if let Some(ms) = f.fanout_deadline_ms {
            self.fanout_deadline = Some(Duration::from_millis(ms));
        }
        if let Some(list) = f.regional_indicators {
            self.regional_indicators = clean_list(list);
        }
        if let Some(e) = f.endpoints {
            let ep = &mut self.endpoints;
            overlay(&mut ep.news_api, e.news_api);
            overlay(&mut ep.gnews, e.gnews);
            overlay(&mut ep.newsdata, e.newsdata);
            overlay(&mut ep.currents, e.currents);
            overlay(&mut ep.waqi, e.waqi);
            overlay(&mut ep.openweather, e.openweather);
            overlay(&mut ep.openaq, e.openaq);
            overlay(&mut ep.owid, e.owid);
            overlay(&mut ep.nominatim, e.nominatim);
            overlay(&mut ep.gemini, e.gemini);
        }
    }

    fn apply_env(&mut self) {
        self.keys.news_api = env_key("NEWS_API_KEY").or(self.keys.news_api.take());
        self.keys.gnews = env_key("GNEWS_API_KEY").or(self.keys.gnews.take());
        self.keys.newsdata = env_key("NEWSDATA_API_KEY").or(self.keys.newsdata.take());
        self.keys.currents = env_key("CURRENTS_API_KEY").or(self.keys.currents.take());
        self.keys.openweather = env_key("OPENWEATHER_API_KEY").or(self.keys.openweather.take());
        self.keys.openaq = env_key("OPENAQ_API_KEY").or(self.keys.openaq.take());
        self.keys.gemini = env_key("GEMINI_API_KEY").or(self.keys.gemini.take());
        if let Some(t) = env_key("WAQI_TOKEN") {
            self.keys.waqi_token = t;
        }

        if let Some(ms) = parse_env_u64("TERRATRACK_FETCH_TIMEOUT_MS") {
            self.fetch_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(s) = parse_env_u64("TERRATRACK_NEWS_CACHE_TTL_SECS") {
            self.news_cache_ttl = Duration::from_secs(s);
        }
        if let Some(s) = parse_env_u64("TERRATRACK_EMISSIONS_CACHE_TTL_SECS") {
            self.emissions_cache_ttl = Duration::from_secs(s);
        }
        if let Some(ms) = parse_env_u64("TERRATRACK_FANOUT_DEADLINE_MS") {
            self.fanout_deadline = Some(Duration::from_millis(ms));
        }
        let ratio = env::var("TERRATRACK_INTERLEAVE_RATIO")
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok());
        let window = parse_env_u64("TERRATRACK_INTERLEAVE_WINDOW").map(|w| w as usize);
        if ratio.is_some() || window.is_some() {
            self.interleave = InterleavePolicy::new(
                ratio.unwrap_or(self.interleave.ratio),
                window.unwrap_or(self.interleave.window),
            );
        }
    }
}

fn config_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    Ok(default.exists().then_some(default))
}

fn load_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

fn overlay(slot: &mut String, value: Option<String>) {
    if let Some(v) = value {
        let v = v.trim().trim_end_matches('/').to_string();
        if !v.is_empty() {
            *slot = v;
        }
    }
}

fn env_key(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse::<u64>().ok())
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}
