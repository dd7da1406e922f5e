// tests/fanout.rs
//
// Fan-out, dedup, interleave and cache behavior through the public API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use terratrack::cache::TtlCache;
use terratrack::error::FetchError;
use terratrack::ingest::aggregate::aggregate;
use terratrack::ingest::dedup::dedupe;
use terratrack::ingest::interleave::{interleave, InterleavePolicy};
use terratrack::ingest::types::{FetchOutcome, NewsQuery, Record, SourceFetcher};

struct Stub {
    name: &'static str,
    outcome: FetchOutcome,
}

#[async_trait]
impl SourceFetcher for Stub {
    async fn fetch(&self, _q: &NewsQuery) -> FetchOutcome {
        self.outcome.clone()
    }
    fn name(&self) -> &str {
        self.name
    }
}

fn rec(title: &str) -> Record {
    Record {
        title: title.into(),
        url: format!("https://example.org/{}", title.replace(' ', "-")),
        ..Record::default()
    }
}

#[tokio::test]
async fn failing_middle_source_is_excluded() {
    let sources: Vec<Arc<dyn SourceFetcher>> = vec![
        Arc::new(Stub {
            name: "one",
            outcome: FetchOutcome::Success(vec![rec("a1"), rec("a2")]),
        }),
        Arc::new(Stub {
            name: "two",
            outcome: FetchOutcome::Failure(FetchError::Status(500)),
        }),
        Arc::new(Stub {
            name: "three",
            outcome: FetchOutcome::Success(vec![rec("c1")]),
        }),
    ];
    let report = aggregate(&sources, &NewsQuery::search("climate", 10), None).await;
    let titles: Vec<_> = report.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, ["a1", "a2", "c1"]);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert!(!report.all_failed());
    assert_eq!(report.sources[1].source, "two");
}

#[test]
fn dedupe_is_idempotent() {
    let mut x = vec![
        rec("Delhi smog worsens as stubble burning peaks"),
        rec("Delhi Smog Worsens As Stubble Burning Peaks"),
        rec("  delhi smog worsens as stubble burning peaks across the north"),
        rec("Glacier retreat accelerates in Himalaya"),
        rec(""),
        rec(""),
    ];
    x[3].published_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let once = dedupe(x);
    let twice = dedupe(once.clone());
    assert_eq!(once, twice);
    assert!(once.len() < 6);
}

#[test]
fn interleave_two_to_one() {
    let p: Vec<String> = (1..=10).map(|i| format!("P{i}")).collect();
    let s: Vec<String> = (1..=5).map(|i| format!("S{i}")).collect();
    let policy = InterleavePolicy::default();
    let out = interleave(&p, &s, &policy, 9);
    assert_eq!(out, ["P1", "P2", "S1", "P3", "P4", "S2", "P5", "P6", "S3"]);
    assert_eq!(interleave(&p, &s, &policy, 9), out);
}

#[test]
fn cache_entry_expires_after_ttl() {
    let cache: TtlCache<String> = TtlCache::new();
    cache.set("k", "v".to_string(), Duration::from_millis(100));
    assert_eq!(cache.get("k").as_deref(), Some("v"));
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(cache.get("k"), None);
}
