// src/ingest/providers/mod.rs
//! News source adapters plus the shared plumbing they use: a bounded JSON GET,
//! lenient field access over untyped payloads, date parsing and a caching
//! decorator.

pub mod currents;
pub mod gnews;
pub mod newsapi;
pub mod newsdata;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::{counter, histogram};
use serde_json::Value;

use crate::cache::TtlCache;
use crate::error::FetchError;
use crate::ingest::types::{FetchOutcome, NewsQuery, Record, SourceFetcher};
use crate::ingest::{normalize_opt, normalize_text};

pub const USER_AGENT: &str = "terratrack/0.1 (+environmental data aggregation)";

/// Shared reqwest client. Per-call timeouts are applied on each request.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = ?e, "http client builder failed; using defaults");
            reqwest::Client::new()
        })
}

/// GET `url` with `params`, bounded by `timeout`, and parse the body as JSON.
pub async fn get_json(
    client: &reqwest::Client,
    url: &str,
    params: &[(&str, String)],
    timeout: Duration,
) -> Result<Value, FetchError> {
    send_json(client.get(url).query(params), timeout).await
}

/// Send a prepared request (extra headers and the like) and parse JSON.
pub async fn send_json(req: reqwest::RequestBuilder, timeout: Duration) -> Result<Value, FetchError> {
    let send = req.timeout(timeout).send();
    // reqwest's own timeout covers the body too; the outer one is the hard stop.
    let resp = match tokio::time::timeout(timeout, send).await {
        Ok(r) => r.map_err(|e| FetchError::from_reqwest(e, timeout))?,
        Err(_) => return Err(FetchError::Timeout(timeout)),
    };
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    resp.json::<Value>().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            FetchError::Schema(e.to_string())
        }
    })
}

/// String at `path`, or `None` for missing / non-string / blank values.
pub fn str_at<'a>(v: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = v;
    for key in path {
        cur = cur.get(*key)?;
    }
    cur.as_str().filter(|s| !s.trim().is_empty())
}

/// Array under `key`; missing or mistyped arrays read as empty.
pub fn items<'a>(body: &'a Value, key: &str) -> &'a [Value] {
    body.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Parse the timestamp shapes seen across providers. Unknown shapes yield `None`.
pub fn parse_published(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|n| n.and_utc())
}

/// Raw, per-provider field picks before normalization.
#[derive(Debug, Default)]
pub struct RawArticle<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub url: Option<&'a str>,
    pub image: Option<&'a str>,
    pub published: Option<&'a str>,
    pub source: Option<&'a str>,
    pub author: Option<&'a str>,
}

impl RawArticle<'_> {
    /// Missing fields default to empty/`None`; never rejects.
    pub fn into_record(self, fallback_source: &str) -> Record {
        Record {
            title: normalize_text(self.title.unwrap_or_default()),
            description: normalize_opt(self.description),
            url: self.url.unwrap_or_default().trim().to_string(),
            image_url: self.image.map(|s| s.trim().to_string()),
            published_at: self.published.and_then(parse_published),
            source_name: normalize_opt(self.source).unwrap_or_else(|| fallback_source.to_string()),
            author: normalize_opt(self.author),
        }
    }
}

/// Wrap a fetch result with timing, counters and a warn log on failure.
pub(crate) fn finish(provider: &str, started: Instant, res: Result<Vec<Record>, FetchError>) -> FetchOutcome {
    histogram!("ingest_fetch_ms").record(started.elapsed().as_secs_f64() * 1_000.0);
    match &res {
        Ok(v) => {
            counter!("ingest_records_total").increment(v.len() as u64);
            tracing::debug!(provider, records = v.len(), "source fetch ok");
        }
        Err(e) => {
            counter!("ingest_provider_errors_total").increment(1);
            tracing::warn!(error = %e, provider, "source fetch failed");
        }
    }
    res.into()
}

// ------------------------------------------------------------
// Caching decorator
// ------------------------------------------------------------

/// Serves repeated queries from a shared `TtlCache`. Only successes are cached;
/// a zero ttl disables caching for this source.
pub struct CachedFetcher<F> {
    inner: F,
    cache: TtlCache<Vec<Record>>,
    ttl: Duration,
}

impl<F: SourceFetcher> CachedFetcher<F> {
    pub fn new(inner: F, cache: TtlCache<Vec<Record>>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    fn key(&self, query: &NewsQuery) -> String {
        format!("{}|{}", self.inner.name(), query.cache_key())
    }
}

#[async_trait]
impl<F: SourceFetcher> SourceFetcher for CachedFetcher<F> {
    async fn fetch(&self, query: &NewsQuery) -> FetchOutcome {
        if self.ttl.is_zero() {
            return self.inner.fetch(query).await;
        }
        let key = self.key(query);
        if let Some(hit) = self.cache.get(&key) {
            return FetchOutcome::Success(hit);
        }
        let outcome = self.inner.fetch(query).await;
        if let FetchOutcome::Success(records) = &outcome {
            self.cache.set(key, records.clone(), self.ttl);
        }
        outcome
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn supports_headlines(&self) -> bool {
        self.inner.supports_headlines()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn published_shapes() {
        let want = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_published("2024-05-01T10:30:00Z"), Some(want));
        assert_eq!(parse_published("2024-05-01 10:30:00"), Some(want));
        assert_eq!(parse_published("2024-05-01 12:30:00 +0200"), Some(want));
        assert_eq!(parse_published("Wed, 01 May 2024 10:30:00 GMT"), Some(want));
        assert_eq!(parse_published("yesterday"), None);
        assert_eq!(parse_published(""), None);
    }

    #[test]
    fn lenient_field_access() {
        let v = json!({"a": {"b": "x"}, "n": 3, "blank": "  ", "list": "nope"});
        assert_eq!(str_at(&v, &["a", "b"]), Some("x"));
        assert_eq!(str_at(&v, &["n"]), None);
        assert_eq!(str_at(&v, &["blank"]), None);
        assert_eq!(str_at(&v, &["a", "missing"]), None);
        assert!(items(&v, "list").is_empty());
        assert!(items(&v, "absent").is_empty());
    }

    #[test]
    fn raw_article_defaults_missing_fields() {
        let r = RawArticle::default().into_record("Fallback");
        assert_eq!(r.title, "");
        assert_eq!(r.url, "");
        assert_eq!(r.source_name, "Fallback");
        assert!(r.published_at.is_none());
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl SourceFetcher for Counting {
        async fn fetch(&self, _q: &NewsQuery) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                FetchOutcome::Failure(FetchError::Status(503))
            } else {
                FetchOutcome::Success(vec![Record {
                    title: "t".into(),
                    ..Record::default()
                }])
            }
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn cached_fetcher_short_circuits_successes_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = TtlCache::new();
        let f = CachedFetcher::new(
            Counting { calls: calls.clone(), fail: false },
            cache.clone(),
            Duration::from_secs(60),
        );
        let q = NewsQuery::search("climate", 5);
        assert!(f.fetch(&q).await.is_success());
        assert!(f.fetch(&q).await.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.size(), 1);

        // different query → separate key
        f.fetch(&NewsQuery::search("flood", 5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let failing_calls = Arc::new(AtomicUsize::new(0));
        let g = CachedFetcher::new(
            Counting { calls: failing_calls.clone(), fail: true },
            TtlCache::new(),
            Duration::from_secs(60),
        );
        g.fetch(&q).await;
        g.fetch(&q).await;
        assert_eq!(failing_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let f = CachedFetcher::new(
            Counting { calls: calls.clone(), fail: false },
            TtlCache::new(),
            Duration::ZERO,
        );
        let q = NewsQuery::search("aqi", 5);
        f.fetch(&q).await;
        f.fetch(&q).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
