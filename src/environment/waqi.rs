// src/environment/waqi.rs
//! World Air Quality Index feed: station AQI plus individual pollutant indices.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use super::observe;
use crate::alerts::rules::MetricSnapshot;
use crate::cache::TtlCache;
use crate::error::FetchError;
use crate::ingest::providers::{get_json, str_at};

/// One station reading. `aqi` is `None` when the station reports "-".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AirReading {
    pub aqi: Option<f64>,
    pub station: Option<String>,
    pub dominant_pollutant: Option<String>,
    pub observed_at: Option<String>,
    /// Pollutant key (`pm25`, `o3`, ...) to sub-index value.
    pub iaqi: BTreeMap<String, f64>,
}

impl AirReading {
    /// Parse a `/feed/...` body. Anything but `status == "ok"` is an error.
    pub fn from_body(body: &Value) -> Result<Self, FetchError> {
        match body.get("status").and_then(Value::as_str) {
            Some("ok") => {}
            other => {
                let msg = str_at(body, &["data"]).unwrap_or("no data");
                return Err(FetchError::Schema(format!(
                    "waqi status {}: {msg}",
                    other.unwrap_or("missing")
                )));
            }
        }
        let data = body
            .get("data")
            .ok_or_else(|| FetchError::Schema("waqi body without data".into()))?;

        let iaqi = data
            .get("iaqi")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| number(v.get("v")?).map(|n| (k.clone(), n)))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            aqi: data.get("aqi").and_then(number),
            station: str_at(data, &["city", "name"]).map(str::to_string),
            dominant_pollutant: str_at(data, &["dominentpol"]).map(str::to_string),
            observed_at: str_at(data, &["time", "s"]).map(str::to_string),
            iaqi,
        })
    }

    pub fn pollutant(&self, key: &str) -> Option<f64> {
        self.iaqi.get(key).copied()
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            aqi: self.aqi,
            pm25: self.pollutant("pm25"),
            pm10: self.pollutant("pm10"),
            o3: self.pollutant("o3"),
            no2: self.pollutant("no2"),
            ..MetricSnapshot::default()
        }
    }
}

/// Numbers arrive either as JSON numbers or numeric strings; "-" means unknown.
fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AqiInfo {
    pub level: &'static str,
    pub description: &'static str,
    pub color: &'static str,
}

/// US EPA band for `aqi`. Upper bounds are inclusive.
pub fn aqi_info(aqi: f64) -> AqiInfo {
    let (level, description, color) = if aqi <= 50.0 {
        (
            "Good",
            "Air quality is satisfactory, and air pollution poses little or no risk.",
            "green",
        )
    } else if aqi <= 100.0 {
        (
            "Moderate",
            "Air quality is acceptable. However, there may be a risk for some people.",
            "yellow",
        )
    } else if aqi <= 150.0 {
        (
            "Unhealthy for Sensitive Groups",
            "Members of sensitive groups may experience health effects.",
            "orange",
        )
    } else if aqi <= 200.0 {
        (
            "Unhealthy",
            "Some members of the general public may experience health effects.",
            "red",
        )
    } else if aqi <= 300.0 {
        (
            "Very Unhealthy",
            "Health alert: The risk of health effects is increased for everyone.",
            "purple",
        )
    } else {
        (
            "Hazardous",
            "Health warning of emergency conditions: everyone is more likely to be affected.",
            "maroon",
        )
    };
    AqiInfo {
        level,
        description,
        color,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollutantDetail {
    pub key: &'static str,
    pub name: &'static str,
    pub value: f64,
    pub unit: &'static str,
}

const POLLUTANTS: [(&str, &str, &str); 6] = [
    ("pm25", "PM2.5", "µg/m³"),
    ("pm10", "PM10", "µg/m³"),
    ("o3", "Ozone", "ppb"),
    ("no2", "NO₂", "ppb"),
    ("so2", "SO₂", "ppb"),
    ("co", "CO", "ppm"),
];

/// Display rows for the pollutants present in `reading`, in fixed order.
pub fn pollutant_details(reading: &AirReading) -> Vec<PollutantDetail> {
    POLLUTANTS
        .iter()
        .filter_map(|&(key, name, unit)| {
            reading.pollutant(key).map(|value| PollutantDetail {
                key,
                name,
                value,
                unit,
            })
        })
        .collect()
}

pub struct WaqiClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    timeout: Duration,
    cache: TtlCache<AirReading>,
    ttl: Duration,
}

impl WaqiClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
            timeout,
            cache: TtlCache::new(),
            ttl: Duration::ZERO,
        }
    }

    /// Cache readings for `ttl`. Zero (the default) always hits the network.
    pub fn with_cache(mut self, cache: TtlCache<AirReading>, ttl: Duration) -> Self {
        self.cache = cache;
        self.ttl = ttl;
        self
    }

    pub async fn by_coords(&self, lat: f64, lon: f64) -> Result<AirReading, FetchError> {
        self.feed(&format!("geo:{lat};{lon}")).await
    }

    pub async fn by_city(&self, city: &str) -> Result<AirReading, FetchError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(FetchError::Schema("empty city".into()));
        }
        self.feed(city).await
    }

    async fn feed(&self, target: &str) -> Result<AirReading, FetchError> {
        let key = format!("waqi|{target}");
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let t0 = Instant::now();
        let url = format!("{}/feed/{}/", self.base_url, target);
        let params = [("token", self.token.clone())];
        let res = match get_json(&self.client, &url, &params, self.timeout).await {
            Ok(body) => AirReading::from_body(&body),
            Err(e) => Err(e),
        };
        observe("waqi", t0, &res);
        let reading = res?;
        self.cache.set(key, reading.clone(), self.ttl);
        Ok(reading)
    }
}
