// src/ingest/classify.rs
//! Named, loose string-matching predicates over records.
//!
//! All of them are plain substring checks on lowercased text. They favor
//! recall: a false positive (e.g. "ani" matching inside "animal") is an
//! accepted cost, a missed match is not.

use crate::ingest::types::Record;

/// Broad environmental keywords; a record needs only one of them.
pub const ENVIRONMENTAL_KEYWORDS: &[&str] = &[
    "climate", "environment", "pollution", "carbon", "emissions", "energy",
    "solar", "wind", "sustainability", "deforestation", "biodiversity",
    "ecosystem", "conservation", "greenhouse", "recycling", "waste",
    "air quality", "water", "ocean", "wildlife", "endangered", "net zero",
    "clean energy", "plastic", "drought", "flood", "wildfire", "hurricane",
    "sea level", "arctic", "antarctic", "ozone", "forest", "weather",
    "nature", "earth", "green", "eco", "renewable", "environmental",
    "smog", "aqi", "monsoon", "heatwave", "cyclone", "glacier",
];

/// Default "regional" indicators (Indian cities, outlets and wire services).
pub const DEFAULT_REGIONAL_INDICATORS: &[&str] = &[
    "india", "indian", "delhi", "mumbai", "bangalore", "chennai", "kolkata",
    "hyderabad", "pune", "ahmedabad", "times of india", "hindustan times",
    "ndtv", "indian express", "the hindu", "livemint", "economic times",
    "deccan", "telegraph india", "news18", "firstpost", "moneycontrol",
    "scroll", "quint", "down to earth", "zee news", "aaj tak", "republic",
    "abp", "wion", "ani", "pti", "ians",
];

/// Outlet domains used to bias NewsAPI towards regional coverage.
pub const REGIONAL_NEWS_DOMAINS: &[&str] = &[
    "timesofindia.indiatimes.com",
    "hindustantimes.com",
    "indianexpress.com",
    "ndtv.com",
    "thehindu.com",
    "livemint.com",
    "business-standard.com",
    "economictimes.indiatimes.com",
    "deccanherald.com",
    "telegraphindia.com",
    "news18.com",
    "firstpost.com",
    "moneycontrol.com",
    "scroll.in",
    "thequint.com",
    "downtoearth.org.in",
];

const URGENT_MARKERS: &[&str] = &[
    "emergency", "disaster", "warning", "alert", "extreme", "critical",
];

/// True if title or description mentions any environmental keyword.
pub fn is_environmental(r: &Record) -> bool {
    let text = format!(
        "{} {}",
        r.title,
        r.description.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    ENVIRONMENTAL_KEYWORDS.iter().any(|k| text.contains(k))
}

/// True if title, source name or url contains any indicator.
/// `indicators` are expected lowercase.
pub fn is_regional_source<S: AsRef<str>>(r: &Record, indicators: &[S]) -> bool {
    let text = format!("{} {} {}", r.title, r.source_name, r.url).to_lowercase();
    indicators.iter().any(|i| text.contains(i.as_ref()))
}

/// Headline contains a word suggesting an emergency.
pub fn is_urgent_headline(title: &str) -> bool {
    let t = title.to_lowercase();
    URGENT_MARKERS.iter().any(|m| t.contains(m))
}
