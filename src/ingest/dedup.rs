// src/ingest/dedup.rs
//! Near-duplicate removal by a loose title key.
//!
//! Key = lowercase title truncated to `DEDUP_KEY_CHARS` characters. Stories
//! republished with small title edits usually share a prefix, so this merges
//! more than it misses. First-seen wins, which makes the survivor depend on
//! input order: sort by recency first if that should be deterministic.
//! Records with empty titles all share one key.

use std::collections::HashSet;

use crate::ingest::types::Record;

pub const DEDUP_KEY_CHARS: usize = 50;

pub fn dedup_key(title: &str) -> String {
    title.to_lowercase().chars().take(DEDUP_KEY_CHARS).collect()
}

/// Keep the first record per key; relative order is preserved.
pub fn dedupe(records: Vec<Record>) -> Vec<Record> {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(dedup_key(&r.title)))
        .collect()
}

/// Sort by `published_at` descending; undated records go last. Stable.
pub fn sort_by_recency(records: &mut [Record]) {
    records.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn rec(title: &str, url: &str) -> Record {
        Record {
            title: title.into(),
            url: url.into(),
            ..Record::default()
        }
    }

    #[test]
    fn first_seen_wins_on_shared_prefix() {
        let long = "Record heatwave scorches northern plains as temperatures climb";
        let variant = "RECORD HEATWAVE SCORCHES NORTHERN PLAINS AS TEMPERATURES SOAR past 47C";
        let out = dedupe(vec![rec(long, "a"), rec("Other story", "b"), rec(variant, "c")]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "a");
        assert_eq!(out[1].url, "b");
    }

    #[test]
    fn empty_titles_collapse() {
        let out = dedupe(vec![rec("", "a"), rec("", "b"), rec("x", "c")]);
        assert_eq!(out.iter().map(|r| r.url.as_str()).collect::<Vec<_>>(), ["a", "c"]);
    }

    #[test]
    fn key_counts_chars_not_bytes() {
        let t = "é".repeat(60);
        assert_eq!(dedup_key(&t).chars().count(), DEDUP_KEY_CHARS);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let input = vec![rec("A", "1"), rec("a", "2"), rec("B", "3"), rec("", "4"), rec("", "5")];
        let once = dedupe(input);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn recency_sort_puts_undated_last() {
        let mut v = vec![rec("old", "1"), rec("none", "2"), rec("new", "3")];
        v[0].published_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        v[2].published_at = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        sort_by_recency(&mut v);
        assert_eq!(v.iter().map(|r| r.url.as_str()).collect::<Vec<_>>(), ["3", "1", "2"]);
    }
}
