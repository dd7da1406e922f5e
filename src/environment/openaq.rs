// src/environment/openaq.rs
//! OpenAQ latest measurements from stations near a point, and the particulate
//! alerts they raise.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::observe;
use crate::alerts::{AlertRecord, Category, Severity};
use crate::error::FetchError;
use crate::ingest::providers::{items, parse_published, send_json, str_at};

/// Search radius around the requested point, in metres.
pub const STATION_RADIUS_M: u32 = 25_000;
pub const STATION_LIMIT: usize = 5;

const PM25_LIMIT: f64 = 35.0;
const PM10_LIMIT: f64 = 154.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub parameter: String,
    pub value: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub location: String,
    pub measurements: Vec<Measurement>,
}

/// Parse a `/latest` body. Measurements without a numeric value are dropped.
pub fn parse_latest(body: &Value) -> Vec<Station> {
    items(body, "results")
        .iter()
        .map(|r| Station {
            location: str_at(r, &["location"]).unwrap_or("Unknown station").to_string(),
            measurements: items(r, "measurements")
                .iter()
                .filter_map(|m| {
                    Some(Measurement {
                        parameter: str_at(m, &["parameter"])?.to_lowercase(),
                        value: m.get("value")?.as_f64()?,
                        last_updated: str_at(m, &["lastUpdated"]).and_then(parse_published),
                    })
                })
                .collect(),
        })
        .collect()
}

/// "12 minutes ago", "3 hours ago" or "2 days ago".
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let mins = (now - then).num_minutes().max(0);
    if mins < 60 {
        format!("{mins} minutes ago")
    } else if mins < 24 * 60 {
        format!("{} hours ago", mins / 60)
    } else {
        format!("{} days ago", mins / (24 * 60))
    }
}

/// Medium air alerts for PM2.5 above 35 and PM10 above 154 µg/m³, per station.
pub fn station_alerts(stations: &[Station], now: DateTime<Utc>) -> Vec<AlertRecord> {
    let mut out = Vec::new();
    for st in stations {
        for m in &st.measurements {
            let label = match m.parameter.as_str() {
                "pm25" if m.value > PM25_LIMIT => "PM2.5",
                "pm10" if m.value > PM10_LIMIT => "PM10",
                _ => continue,
            };
            let when = m
                .last_updated
                .map(|t| time_ago(t, now))
                .unwrap_or_else(|| "at an unknown time".to_string());
            out.push(AlertRecord::new(
                Severity::Medium,
                Category::Air,
                format!("High {label} at {}", st.location),
                format!("{label}: {:.1} µg/m³ - Measured {when}", m.value),
                "💨",
            ));
        }
    }
    out
}

pub struct OpenAqClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAqClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            timeout,
        }
    }

    pub async fn nearby(&self, lat: f64, lon: f64) -> Result<Vec<Station>, FetchError> {
        let t0 = Instant::now();
        let res = self.nearby_inner(lat, lon).await;
        observe("openaq", t0, &res);
        res
    }

    async fn nearby_inner(&self, lat: f64, lon: f64) -> Result<Vec<Station>, FetchError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(FetchError::NotConfigured("openaq"))?;
        let params = [
            ("coordinates", format!("{lat},{lon}")),
            ("radius", STATION_RADIUS_M.to_string()),
            ("limit", STATION_LIMIT.to_string()),
        ];
        let req = self
            .client
            .get(format!("{}/latest", self.base_url))
            .query(&params)
            .header("X-API-Key", key);
        let body = send_json(req, self.timeout).await?;
        Ok(parse_latest(&body))
    }
}
