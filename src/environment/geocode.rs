// src/environment/geocode.rs
//! Nominatim reverse and forward geocoding.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use super::observe;
use crate::error::FetchError;
use crate::ingest::providers::{get_json, str_at};

pub const GEOCODE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    /// Most specific place name available.
    pub name: String,
    pub state: Option<String>,
    pub country: Option<String>,
    /// False when built from coordinates alone.
    pub resolved: bool,
}

impl Location {
    /// Placeholder used when the geocoder is unreachable.
    pub fn from_coords(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            name: format!("{lat:.2}, {lon:.2}"),
            state: None,
            country: None,
            resolved: false,
        }
    }
}

/// Parse a `/reverse` body; the place name is the most specific of
/// city/town/village/hamlet/state/region/country.
pub fn parse_reverse(body: &Value, lat: f64, lon: f64) -> Option<Location> {
    let addr = body.get("address")?;
    let pick = |k: &str| str_at(addr, &[k]).map(str::to_string);
    let name = ["city", "town", "village", "hamlet", "state", "region", "country"]
        .iter()
        .find_map(|k| pick(k))
        .or_else(|| str_at(body, &["display_name"]).map(str::to_string))?;
    Some(Location {
        lat,
        lon,
        name,
        state: pick("state"),
        country: pick("country"),
        resolved: true,
    })
}

/// Parse a `/search` body (array of hits, coordinates as strings).
pub fn parse_search(body: &Value, query: &str) -> Option<Location> {
    let hit = body.as_array()?.first()?;
    let coord = |k: &str| -> Option<f64> {
        match hit.get(k)? {
            Value::String(s) => s.parse().ok(),
            v => v.as_f64(),
        }
    };
    let display = str_at(hit, &["display_name"]);
    Some(Location {
        lat: coord("lat")?,
        lon: coord("lon")?,
        name: query.trim().to_string(),
        state: None,
        country: display
            .and_then(|d| d.rsplit(',').next())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
        resolved: true,
    })
}

pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
}

impl Geocoder {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Never fails: any upstream problem yields `Location::from_coords`.
    pub async fn reverse(&self, lat: f64, lon: f64) -> Location {
        let t0 = Instant::now();
        let url = format!("{}/reverse", self.base_url);
        let params = [
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("format", "json".to_string()),
            ("addressdetails", "1".to_string()),
        ];
        let res = get_json(&self.client, &url, &params, GEOCODE_TIMEOUT)
            .await
            .and_then(|body| {
                parse_reverse(&body, lat, lon)
                    .ok_or_else(|| FetchError::Schema("reverse geocode without address".into()))
            });
        observe("nominatim", t0, &res);
        res.unwrap_or_else(|_| Location::from_coords(lat, lon))
    }

    /// `Ok(None)` when the place is unknown.
    pub async fn search(&self, query: &str) -> Result<Option<Location>, FetchError> {
        let q = query.trim();
        if q.is_empty() {
            return Ok(None);
        }
        let t0 = Instant::now();
        let url = format!("{}/search", self.base_url);
        let params = [
            ("q", q.to_string()),
            ("format", "json".to_string()),
            ("limit", "1".to_string()),
        ];
        let res = get_json(&self.client, &url, &params, GEOCODE_TIMEOUT).await;
        observe("nominatim", t0, &res);
        Ok(parse_search(&res?, q))
    }
}
