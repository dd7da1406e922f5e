// src/ingest/providers/currents.rs
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use super::{finish, get_json, items, str_at, RawArticle};
use crate::error::FetchError;
use crate::ingest::types::{FetchOutcome, NewsQuery, Record, SourceFetcher};

/// Currents API adapter (`/search`).
pub struct CurrentsFetcher {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl CurrentsFetcher {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            timeout,
        }
    }

    pub fn map_body(body: &Value) -> Vec<Record> {
        items(body, "news")
            .iter()
            .map(|a| {
                let author = str_at(a, &["author"]);
                RawArticle {
                    title: str_at(a, &["title"]),
                    description: str_at(a, &["description"]),
                    url: str_at(a, &["url"]),
                    // Currents sends the literal string "None" for missing images.
                    image: str_at(a, &["image"]).filter(|s| *s != "None"),
                    published: str_at(a, &["published"]),
                    source: author,
                    author,
                }
                .into_record("Currents API")
            })
            .collect()
    }

    async fn fetch_inner(&self, q: &NewsQuery) -> Result<Vec<Record>, FetchError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(FetchError::NotConfigured("currents"))?;

        let params: Vec<(&str, String)> = vec![
            ("apiKey", key.to_string()),
            ("keywords", q.text.clone()),
            ("language", "en".into()),
            ("limit", q.page_size.to_string()),
        ];

        let url = format!("{}/search", self.base_url);
        let body = get_json(&self.client, &url, &params, self.timeout).await?;
        Ok(Self::map_body(&body))
    }
}

#[async_trait]
impl SourceFetcher for CurrentsFetcher {
    async fn fetch(&self, query: &NewsQuery) -> FetchOutcome {
        let t0 = Instant::now();
        let res = self.fetch_inner(query).await;
        finish(self.name(), t0, res)
    }

    fn name(&self) -> &str {
        "currents"
    }
}
