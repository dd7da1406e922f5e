// src/ingest/providers/newsdata.rs
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use super::{finish, get_json, items, str_at, RawArticle};
use crate::error::FetchError;
use crate::ingest::types::{FetchOutcome, NewsQuery, Record, SourceFetcher};

/// NewsData.io adapter (`/latest`). Ignores categories.
pub struct NewsDataFetcher {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl NewsDataFetcher {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            timeout,
        }
    }

    pub fn map_body(body: &Value) -> Vec<Record> {
        items(body, "results")
            .iter()
            .map(|a| {
                // `creator` is a list of names; only the first is kept.
                let author = a
                    .get("creator")
                    .and_then(Value::as_array)
                    .and_then(|c| c.first())
                    .and_then(Value::as_str);
                RawArticle {
                    title: str_at(a, &["title"]),
                    description: str_at(a, &["description"]),
                    url: str_at(a, &["link"]),
                    image: str_at(a, &["image_url"]),
                    published: str_at(a, &["pubDate"]),
                    source: str_at(a, &["source_id"]),
                    author,
                }
                .into_record("NewsData")
            })
            .collect()
    }

    async fn fetch_inner(&self, q: &NewsQuery) -> Result<Vec<Record>, FetchError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(FetchError::NotConfigured("newsdata"))?;

        let mut params: Vec<(&str, String)> = vec![
            ("apikey", key.to_string()),
            ("q", q.text.clone()),
            ("language", "en".into()),
            ("size", q.page_size.to_string()),
        ];
        if let Some(c) = &q.country {
            params.push(("country", c.clone()));
        }

        let url = format!("{}/latest", self.base_url);
        let body = get_json(&self.client, &url, &params, self.timeout).await?;
        if str_at(&body, &["status"]) == Some("error") {
            return Err(FetchError::Schema("newsdata status=error".into()));
        }
        Ok(Self::map_body(&body))
    }
}

#[async_trait]
impl SourceFetcher for NewsDataFetcher {
    async fn fetch(&self, query: &NewsQuery) -> FetchOutcome {
        let t0 = Instant::now();
        let res = self.fetch_inner(query).await;
        finish(self.name(), t0, res)
    }

    fn name(&self) -> &str {
        "newsdata"
    }
}
