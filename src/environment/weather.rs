// src/environment/weather.rs
//! OpenWeather current conditions, the 5-day forecast and air pollution
//! components (current, forecast and history).

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use super::observe;
use crate::alerts::rules::MetricSnapshot;
use crate::error::FetchError;
use crate::ingest::providers::{get_json, str_at};

fn f64_at(v: &Value, path: &[&str]) -> Option<f64> {
    let mut cur = v;
    for key in path {
        cur = cur.get(*key)?;
    }
    cur.as_f64()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    /// `weather[0].main`, e.g. "Rain".
    pub condition: Option<String>,
    pub description: Option<String>,
}

impl WeatherReport {
    pub fn from_body(body: &Value) -> Self {
        let first = body
            .get("weather")
            .and_then(Value::as_array)
            .and_then(|w| w.first());
        Self {
            temperature: f64_at(body, &["main", "temp"]),
            feels_like: f64_at(body, &["main", "feels_like"]),
            humidity: f64_at(body, &["main", "humidity"]),
            wind_speed: f64_at(body, &["wind", "speed"]),
            condition: first.and_then(|w| str_at(w, &["main"])).map(str::to_string),
            description: first
                .and_then(|w| str_at(w, &["description"]))
                .map(str::to_string),
        }
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            temperature: self.temperature,
            feels_like: self.feels_like,
            wind_speed: self.wind_speed,
            humidity: self.humidity,
            condition: self.condition.clone(),
            ..MetricSnapshot::default()
        }
    }
}

/// OpenWeather air pollution sample. `index` is the 1..=5 OWM scale, not US AQI.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AirPollution {
    pub index: Option<u8>,
    /// Component concentrations in µg/m³ keyed by OWM name (`pm2_5`, `no2`, ...).
    pub components: BTreeMap<String, f64>,
}

impl AirPollution {
    /// First sample of an `/air_pollution` body.
    pub fn from_body(body: &Value) -> Result<Self, FetchError> {
        let sample = body
            .get("list")
            .and_then(Value::as_array)
            .and_then(|l| l.first())
            .ok_or_else(|| FetchError::Schema("air_pollution list is empty".into()))?;
        Ok(Self::from_sample(sample))
    }

    fn from_sample(sample: &Value) -> Self {
        let components = sample
            .get("components")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            index: sample
                .pointer("/main/aqi")
                .and_then(Value::as_u64)
                .and_then(|n| u8::try_from(n).ok()),
            components,
        }
    }

    pub fn label(&self) -> Option<&'static str> {
        self.index.map(owm_index_label)
    }

    /// Pollutant readings only; OWM's index is not comparable with US AQI.
    pub fn snapshot(&self) -> MetricSnapshot {
        let c = |k: &str| self.components.get(k).copied();
        MetricSnapshot {
            pm25: c("pm2_5"),
            pm10: c("pm10"),
            o3: c("o3"),
            no2: c("no2"),
            ..MetricSnapshot::default()
        }
    }
}

/// Label for the OWM 1..=5 index. Unknown values read as "Good".
pub fn owm_index_label(index: u8) -> &'static str {
    match index {
        2 => "Fair",
        3 => "Moderate",
        4 => "Poor",
        5 => "Very Poor",
        _ => "Good",
    }
}

/// One timestamped entry of a forecast or history series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timed<T> {
    /// Unix seconds (`dt`).
    pub at: i64,
    #[serde(flatten)]
    pub value: T,
}

/// Entries of `list[]` that carry a `dt`; others are skipped.
fn timed_list<T>(body: &Value, parse: impl Fn(&Value) -> T) -> Vec<Timed<T>> {
    body.get("list")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(|e| {
            Some(Timed {
                at: e.get("dt")?.as_i64()?,
                value: parse(e),
            })
        })
        .collect()
}

pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenWeatherClient {
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

    fn params(&self, lat: f64, lon: f64) -> Result<Vec<(&'static str, String)>, FetchError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(FetchError::NotConfigured("openweather"))?;
        Ok(vec![
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("appid", key.to_string()),
        ])
    }

    pub async fn current(&self, lat: f64, lon: f64) -> Result<WeatherReport, FetchError> {
        let t0 = Instant::now();
        let res = self.current_inner(lat, lon).await;
        observe("openweather", t0, &res);
        res
    }

    pub async fn air_pollution(&self, lat: f64, lon: f64) -> Result<AirPollution, FetchError> {
        let t0 = Instant::now();
        let res = self.air_inner(lat, lon).await;
        observe("openweather_air", t0, &res);
        res
    }

    /// 3-hourly steps over the next five days.
    pub async fn forecast(&self, lat: f64, lon: f64) -> Result<Vec<Timed<WeatherReport>>, FetchError> {
        let t0 = Instant::now();
        let res = self.forecast_inner(lat, lon).await;
        observe("openweather_forecast", t0, &res);
        res
    }

    pub async fn air_forecast(&self, lat: f64, lon: f64) -> Result<Vec<Timed<AirPollution>>, FetchError> {
        let t0 = Instant::now();
        let res = self.air_series("air_pollution/forecast", self.params(lat, lon)).await;
        observe("openweather_air", t0, &res);
        res
    }

    /// Samples between `start` and `end` (unix seconds, inclusive).
    pub async fn air_history(
        &self,
        lat: f64,
        lon: f64,
        start: i64,
        end: i64,
    ) -> Result<Vec<Timed<AirPollution>>, FetchError> {
        if start > end {
            return Err(FetchError::Schema(format!("history start {start} is after end {end}")));
        }
        let t0 = Instant::now();
        let params = self.params(lat, lon).map(|mut p| {
            p.push(("start", start.to_string()));
            p.push(("end", end.to_string()));
            p
        });
        let res = self.air_series("air_pollution/history", params).await;
        observe("openweather_air", t0, &res);
        res
    }

    async fn get(&self, path: &str, params: &[(&'static str, String)]) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        get_json(&self.client, &url, params, self.timeout).await
    }

    async fn current_inner(&self, lat: f64, lon: f64) -> Result<WeatherReport, FetchError> {
        let mut params = self.params(lat, lon)?;
        params.push(("units", "metric".into()));
        let body = self.get("weather", &params).await?;
        Ok(WeatherReport::from_body(&body))
    }

    async fn forecast_inner(&self, lat: f64, lon: f64) -> Result<Vec<Timed<WeatherReport>>, FetchError> {
        let mut params = self.params(lat, lon)?;
        params.push(("units", "metric".into()));
        let body = self.get("forecast", &params).await?;
        Ok(timed_list(&body, WeatherReport::from_body))
    }

    async fn air_series(
        &self,
        path: &str,
        params: Result<Vec<(&'static str, String)>, FetchError>,
    ) -> Result<Vec<Timed<AirPollution>>, FetchError> {
        let body = self.get(path, &params?).await?;
        Ok(timed_list(&body, AirPollution::from_sample))
    }

    async fn air_inner(&self, lat: f64, lon: f64) -> Result<AirPollution, FetchError> {
        let params = self.params(lat, lon)?;
        let body = self.get("air_pollution", &params).await?;
        AirPollution::from_body(&body)
    }
}
