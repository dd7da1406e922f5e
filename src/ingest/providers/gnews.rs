// src/ingest/providers/gnews.rs
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use super::{finish, get_json, items, str_at, RawArticle};
use crate::error::FetchError;
use crate::ingest::types::{FetchOutcome, NewsQuery, Record, SourceFetcher};

/// GNews adapter. Supports a country hint on both search and top headlines.
pub struct GNewsFetcher {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl GNewsFetcher {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            timeout,
        }
    }

    pub fn map_body(body: &Value) -> Vec<Record> {
        items(body, "articles")
            .iter()
            .map(|a| {
                RawArticle {
                    title: str_at(a, &["title"]),
                    description: str_at(a, &["description"]),
                    url: str_at(a, &["url"]),
                    image: str_at(a, &["image"]),
                    published: str_at(a, &["publishedAt"]),
                    source: str_at(a, &["source", "name"]),
                    author: str_at(a, &["author"]),
                }
                .into_record("GNews")
            })
            .collect()
    }

    async fn fetch_inner(&self, q: &NewsQuery) -> Result<Vec<Record>, FetchError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(FetchError::NotConfigured("gnews"))?;

        let mut params: Vec<(&str, String)> = vec![
            ("apikey", key.to_string()),
            ("lang", "en".into()),
            ("max", q.page_size.to_string()),
        ];
        if let Some(c) = &q.country {
            params.push(("country", c.clone()));
        }
        let endpoint = match &q.category {
            Some(category) => {
                params.push(("category", category.clone()));
                "top-headlines"
            }
            None => {
                params.push(("q", q.text.clone()));
                "search"
            }
        };

        let url = format!("{}/{}", self.base_url, endpoint);
        let body = get_json(&self.client, &url, &params, self.timeout).await?;
        if body.get("errors").is_some() && body.get("articles").is_none() {
            return Err(FetchError::Schema(format!("gnews errors: {}", body["errors"])));
        }
        Ok(Self::map_body(&body))
    }
}

#[async_trait]
impl SourceFetcher for GNewsFetcher {
    async fn fetch(&self, query: &NewsQuery) -> FetchOutcome {
        let t0 = Instant::now();
        let res = self.fetch_inner(query).await;
        finish(self.name(), t0, res)
    }

    fn name(&self) -> &str {
        "gnews"
    }

    fn supports_headlines(&self) -> bool {
        true
    }
}
