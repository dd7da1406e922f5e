// src/ingest/feed.rs
//! News pipelines built from the ingest stages:
//! fan-out → keyword filter → recency sort → dedup → (split + interleave).

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;

use super::aggregate::{aggregate, AggregateReport};
use super::classify::{is_environmental, is_regional_source, REGIONAL_NEWS_DOMAINS};
use super::dedup::{dedupe, sort_by_recency};
use super::interleave::{interleave, InterleavePolicy};
use super::providers::{
    currents::CurrentsFetcher, gnews::GNewsFetcher, newsapi::NewsApiFetcher,
    newsdata::NewsDataFetcher, CachedFetcher,
};
use super::types::{NewsQuery, Record, SourceFetcher};
use crate::cache::TtlCache;
use crate::config::Config;

pub const ENVIRONMENTAL_QUERY: &str =
    "climate OR environment OR pollution OR \"renewable energy\" OR sustainability OR weather";
const REGIONAL_QUERY: &str = "climate OR environment OR pollution";
const REGIONAL_COUNTRY: &str = "in";
const HEADLINES_CATEGORY: &str = "science";
const HEADLINES_FETCH: u32 = 20;
const HEADLINES_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Ok,
    /// No source answered. Distinct from `Ok` with zero articles.
    NoData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsFeed {
    pub articles: Vec<Record>,
    pub total_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_count: Option<usize>,
    pub status: FeedStatus,
}

impl NewsFeed {
    fn plain(articles: Vec<Record>, total_results: usize, status: FeedStatus) -> Self {
        Self {
            articles,
            total_results,
            regional_count: None,
            global_count: None,
            status,
        }
    }
}

fn status_of(reports: &[&AggregateReport]) -> FeedStatus {
    if reports.iter().all(|r| r.succeeded() == 0) {
        FeedStatus::NoData
    } else {
        FeedStatus::Ok
    }
}

/// Keyword filter, then recency sort, then dedup. Sorting first keeps the
/// first-seen tie-break independent of source completion order.
fn refine(records: Vec<Record>) -> Vec<Record> {
    let before = records.len();
    let mut kept: Vec<Record> = records.into_iter().filter(is_environmental).collect();
    counter!("ingest_filtered_total").increment((before - kept.len()) as u64);

    sort_by_recency(&mut kept);
    let sorted = kept.len();
    let unique = dedupe(kept);
    counter!("ingest_dedup_total").increment((sorted - unique.len()) as u64);
    unique
}

pub struct NewsService {
    sources: Vec<Arc<dyn SourceFetcher>>,
    policy: InterleavePolicy,
    page_size: usize,
    deadline: Option<Duration>,
    regional_indicators: Vec<String>,
}

impl NewsService {
    pub fn new(sources: Vec<Arc<dyn SourceFetcher>>, cfg: &Config) -> Self {
        Self {
            sources,
            policy: cfg.interleave,
            page_size: cfg.page_size,
            deadline: cfg.fanout_deadline,
            regional_indicators: cfg
                .regional_indicators
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }

    /// Build the configured adapters (sources without a key are left out),
    /// each wrapped in a cache sharing `cache`.
    pub fn from_config(cfg: &Config, client: reqwest::Client, cache: TtlCache<Vec<Record>>) -> Self {
        let ep = &cfg.endpoints;
        let keys = &cfg.keys;
        let t = cfg.fetch_timeout;
        let ttl = cfg.news_cache_ttl;

        let mut sources: Vec<Arc<dyn SourceFetcher>> = Vec::new();
        if keys.news_api.is_some() {
            let f = NewsApiFetcher::new(client.clone(), &ep.news_api, keys.news_api.clone(), t);
            sources.push(Arc::new(CachedFetcher::new(f, cache.clone(), ttl)));
        }
        if keys.gnews.is_some() {
            let f = GNewsFetcher::new(client.clone(), &ep.gnews, keys.gnews.clone(), t);
            sources.push(Arc::new(CachedFetcher::new(f, cache.clone(), ttl)));
        }
        if keys.newsdata.is_some() {
            let f = NewsDataFetcher::new(client.clone(), &ep.newsdata, keys.newsdata.clone(), t);
            sources.push(Arc::new(CachedFetcher::new(f, cache.clone(), ttl)));
        }
        if keys.currents.is_some() {
            let f = CurrentsFetcher::new(client, &ep.currents, keys.currents.clone(), t);
            sources.push(Arc::new(CachedFetcher::new(f, cache, ttl)));
        }
        if sources.is_empty() {
            tracing::warn!("no news source has an API key; news feeds will report no_data");
        }
        Self::new(sources, cfg)
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn default_page_size(&self) -> usize {
        self.page_size
    }

    /// Mixed regional/global environmental feed, regional first at the
    /// configured ratio.
    pub async fn environmental_news(&self, country: Option<&str>, page_size: usize) -> NewsFeed {
        let regional_q = NewsQuery::search(ENVIRONMENTAL_QUERY, 40)
            .with_country(REGIONAL_COUNTRY)
            .with_domains(REGIONAL_NEWS_DOMAINS.join(","));
        let mut global_q = NewsQuery::search(ENVIRONMENTAL_QUERY, 20);
        if let Some(c) = country {
            global_q = global_q.with_country(c);
        }

        let (regional, global) = tokio::join!(
            aggregate(&self.sources, &regional_q, self.deadline),
            aggregate(&self.sources, &global_q, self.deadline),
        );
        let status = status_of(&[&regional, &global]);

        let mut merged = regional.records;
        merged.extend(global.records);
        let unique = refine(merged);

        let (primary, secondary): (Vec<Record>, Vec<Record>) = unique
            .iter()
            .cloned()
            .partition(|r| is_regional_source(r, &self.regional_indicators));
        let articles = interleave(&primary, &secondary, &self.policy, page_size);

        tracing::info!(
            total = unique.len(),
            regional = primary.len(),
            global = secondary.len(),
            returned = articles.len(),
            ?status,
            "environmental news assembled"
        );

        NewsFeed {
            articles,
            total_results: unique.len(),
            regional_count: Some(primary.len()),
            global_count: Some(secondary.len()),
            status,
        }
    }

    /// Science-category headlines from the sources that have a headlines endpoint.
    pub async fn top_headlines(&self, country: &str) -> NewsFeed {
        let capable: Vec<Arc<dyn SourceFetcher>> = self
            .sources
            .iter()
            .filter(|s| s.supports_headlines())
            .cloned()
            .collect();
        let q = NewsQuery::headlines(HEADLINES_CATEGORY, country, HEADLINES_FETCH);
        let report = aggregate(&capable, &q, self.deadline).await;
        let status = status_of(&[&report]);
        let unique = refine(report.records);
        let total = unique.len();
        NewsFeed::plain(unique.into_iter().take(HEADLINES_LIMIT).collect(), total, status)
    }

    /// Regional-only environmental coverage, newest first.
    pub async fn regional_news(&self, page_size: usize) -> NewsFeed {
        let q = NewsQuery::search(REGIONAL_QUERY, 15).with_country(REGIONAL_COUNTRY);
        let report = aggregate(&self.sources, &q, self.deadline).await;
        let status = status_of(&[&report]);
        let unique = refine(report.records);
        let total = unique.len();
        NewsFeed::plain(unique.into_iter().take(page_size).collect(), total, status)
    }

    /// Environmental coverage mentioning `location`.
    pub async fn news_by_location(&self, location: &str, page_size: usize) -> NewsFeed {
        let location = location.trim();
        let text = format!(
            "{location} climate OR {location} environment OR {location} weather OR {location} pollution"
        );
        tracing::debug!(q = %super::anon_hash(&text), "location news");
        let q = NewsQuery::search(text, 15);
        let report = aggregate(&self.sources, &q, self.deadline).await;
        let status = status_of(&[&report]);
        let unique = refine(report.records);
        let total = unique.len();
        NewsFeed::plain(unique.into_iter().take(page_size).collect(), total, status)
    }
}
