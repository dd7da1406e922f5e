// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_stream_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    /// "gemini" | "mock" (case-insensitive)
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from GEMINI_API_KEY
    #[serde(default)]
    pub api_key: String,
    /// Upper bound for one whole streamed response.
    #[serde(default = "default_stream_timeout_secs")]
    pub stream_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "gemini".to_string(),
            model: default_model(),
            api_key: String::new(),
            stream_timeout_secs: default_stream_timeout_secs(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> anyhow::Result<Self> {
        let mut cfg: AiConfig = serde_json::from_str(data)?;

        // Normalize provider
        cfg.provider = cfg.provider.trim().to_lowercase();

        // Resolve api key if "ENV"
        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "gemini" => env::var("GEMINI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing GEMINI_API_KEY env var"))?,
                "mock" => String::new(),
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        if cfg.model.trim().is_empty() {
            cfg.model = default_model();
        }
        if cfg.stream_timeout_secs == 0 {
            cfg.stream_timeout_secs = default_stream_timeout_secs();
        }

        Ok(cfg)
    }

    /// File config if present, otherwise defaults enabled only when a key is
    /// in the env. A file that exists but does not load is logged and skipped.
    pub fn load_or_env() -> Self {
        Self::load_or_env_from(DEFAULT_AI_CONFIG_PATH)
    }

    pub fn load_or_env_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load_from_file(path) {
                Ok(cfg) => return cfg,
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "ignoring unusable AI config; falling back to environment"
                ),
            }
        }
        let key = env::var("GEMINI_API_KEY").unwrap_or_default();
        Self {
            enabled: !key.trim().is_empty(),
            api_key: key,
            ..Self::default()
        }
    }

    /// Use `key` when no api key was configured.
    pub fn with_fallback_key(mut self, key: Option<&str>) -> Self {
        if self.api_key.trim().is_empty() {
            if let Some(k) = key.map(str::trim).filter(|k| !k.is_empty()) {
                self.api_key = k.to_string();
            }
        }
        self
    }
}
