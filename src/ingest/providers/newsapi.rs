// src/ingest/providers/newsapi.rs
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use super::{finish, get_json, items, str_at, RawArticle};
use crate::error::FetchError;
use crate::ingest::types::{FetchOutcome, NewsQuery, Record, SourceFetcher};

/// NewsAPI.org adapter: `/everything` for searches, `/top-headlines` when a category is set.
pub struct NewsApiFetcher {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl NewsApiFetcher {
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
                    image: str_at(a, &["urlToImage"]),
                    published: str_at(a, &["publishedAt"]),
                    source: str_at(a, &["source", "name"]),
                    author: str_at(a, &["author"]),
                }
                .into_record("News API")
            })
            .collect()
    }

    async fn fetch_inner(&self, q: &NewsQuery) -> Result<Vec<Record>, FetchError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(FetchError::NotConfigured("newsapi"))?;

        let mut params: Vec<(&str, String)> = vec![
            ("apiKey", key.to_string()),
            ("pageSize", q.page_size.to_string()),
        ];
        let endpoint = if let Some(category) = &q.category {
            params.push(("category", category.clone()));
            if let Some(c) = &q.country {
                params.push(("country", c.clone()));
            }
            "top-headlines"
        } else {
            params.push(("q", q.text.clone()));
            params.push(("sortBy", "publishedAt".into()));
            params.push(("language", "en".into()));
            if let Some(d) = &q.domains {
                params.push(("domains", d.clone()));
            }
            "everything"
        };

        let url = format!("{}/{}", self.base_url, endpoint);
        let body = get_json(&self.client, &url, &params, self.timeout).await?;
        if str_at(&body, &["status"]) == Some("error") {
            let msg = str_at(&body, &["message"]).unwrap_or("status=error");
            return Err(FetchError::Schema(msg.to_string()));
        }
        Ok(Self::map_body(&body))
    }
}

#[async_trait]
impl SourceFetcher for NewsApiFetcher {
    async fn fetch(&self, query: &NewsQuery) -> FetchOutcome {
        let t0 = Instant::now();
        let res = self.fetch_inner(query).await;
        finish(self.name(), t0, res)
    }

    fn name(&self) -> &str {
        "newsapi"
    }

    fn supports_headlines(&self) -> bool {
        true
    }
}
