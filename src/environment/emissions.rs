// src/environment/emissions.rs
//! Our World in Data grapher datasets (CO₂ and other greenhouse gases).
//!
//! Each dataset is a single JSON document covering every country, so whole
//! bodies are cached per dataset and country lookups run against the cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use super::observe;
use crate::alerts::rules::MetricSnapshot;
use crate::cache::TtlCache;
use crate::error::FetchError;
use crate::ingest::providers::get_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Dataset {
    AnnualCo2,
    CumulativeCo2,
    Co2PerCapita,
    Co2GrowthRate,
    Co2BySector,
    Co2Transport,
    Co2Electricity,
    Co2Intensity,
    EnergyBySource,
    FossilFuelCo2,
    TotalGhg,
    Methane,
    NitrousOxide,
}

impl Dataset {
    pub const ALL: [Dataset; 13] = [
        Dataset::AnnualCo2,
        Dataset::CumulativeCo2,
        Dataset::Co2PerCapita,
        Dataset::Co2GrowthRate,
        Dataset::Co2BySector,
        Dataset::Co2Transport,
        Dataset::Co2Electricity,
        Dataset::Co2Intensity,
        Dataset::EnergyBySource,
        Dataset::FossilFuelCo2,
        Dataset::TotalGhg,
        Dataset::Methane,
        Dataset::NitrousOxide,
    ];

    /// Grapher chart slug.
    pub fn slug(self) -> &'static str {
        match self {
            Dataset::AnnualCo2 => "annual-co2-emissions-per-country",
            Dataset::CumulativeCo2 => "cumulative-co-emissions",
            Dataset::Co2PerCapita => "co2-per-capita",
            Dataset::Co2GrowthRate => "annual-co2-growth",
            Dataset::Co2BySector => "co2-emissions-by-sector",
            Dataset::Co2Transport => "co2-emissions-transport",
            Dataset::Co2Electricity => "co2-emissions-electricity",
            Dataset::Co2Intensity => "co2-intensity",
            Dataset::EnergyBySource => "energy-consumption-by-source-and-country",
            Dataset::FossilFuelCo2 => "fossil-fuel-co2-emissions-by-fuel",
            Dataset::TotalGhg => "total-ghg-emissions",
            Dataset::Methane => "methane-emissions",
            Dataset::NitrousOxide => "nitrous-oxide-emissions",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.slug() == slug)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearValue {
    pub year: i32,
    pub value: f64,
}

/// One entity's rows from a dataset, in source order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub entity: String,
    pub points: Vec<YearValue>,
}

impl Series {
    /// Value for the most recent year.
    pub fn latest(&self) -> Option<YearValue> {
        self.points.iter().copied().max_by_key(|p| p.year)
    }
}

/// Rows for `country` (case-insensitive entity name). `None` when the entity
/// is not in the dataset.
///
/// Rows reference entities by position in `entities`; older exports use the
/// entity's `id` instead. Position is tried first and `id` only when no row
/// matches by position, so one entity's id never pulls in another's rows.
pub fn filter_by_country(body: &Value, country: &str) -> Option<Series> {
    let data = body.get("data").unwrap_or(body);
    let entities = data.get("entities")?.as_array()?;
    let wanted = country.trim().to_lowercase();
    let (index, entity) = entities.iter().enumerate().find(|(_, e)| {
        e.get("name")
            .and_then(Value::as_str)
            .is_some_and(|n| n.to_lowercase() == wanted)
    })?;
    let name = entity
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(country)
        .to_string();

    let rows = data
        .get("values")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let mut points = points_for(rows, index as i64);
    if points.is_empty() {
        if let Some(id) = entity.get("id").and_then(Value::as_i64) {
            points = points_for(rows, id);
        }
    }
    Some(Series {
        entity: name,
        points,
    })
}

fn points_for(rows: &[Value], entity: i64) -> Vec<YearValue> {
    rows.iter()
        .filter(|v| v.get("entity").and_then(Value::as_i64) == Some(entity))
        .filter_map(|v| {
            Some(YearValue {
                year: i32::try_from(v.get("year")?.as_i64()?).ok()?,
                value: v.get("value")?.as_f64()?,
            })
        })
        .collect()
}

/// Latest headline figures for one country.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionsProfile {
    pub country: String,
    pub annual_co2: Option<YearValue>,
    pub co2_per_capita: Option<YearValue>,
    pub co2_growth_pct: Option<YearValue>,
}

impl EmissionsProfile {
    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            co2_growth_pct: self.co2_growth_pct.map(|p| p.value),
            co2_per_capita: self.co2_per_capita.map(|p| p.value),
            annual_co2: self.annual_co2.map(|p| p.value),
            region: Some(self.country.clone()),
            ..MetricSnapshot::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.annual_co2.is_none() && self.co2_per_capita.is_none() && self.co2_growth_pct.is_none()
    }
}

pub struct EmissionsClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    cache: TtlCache<Arc<Value>>,
    ttl: Duration,
}

impl EmissionsClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
        cache: TtlCache<Arc<Value>>,
        ttl: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
            cache,
            ttl,
        }
    }

    /// Whole dataset body, served from cache while fresh.
    pub async fn dataset(&self, ds: Dataset) -> Result<Arc<Value>, FetchError> {
        if let Some(hit) = self.cache.get(ds.slug()) {
            return Ok(hit);
        }
        let t0 = Instant::now();
        let url = format!("{}/{}.json", self.base_url, ds.slug());
        let res = get_json(&self.client, &url, &[], self.timeout).await;
        observe("owid", t0, &res);
        let body = Arc::new(res?);
        self.cache.set(ds.slug(), Arc::clone(&body), self.ttl);
        Ok(body)
    }

    pub async fn series(&self, ds: Dataset, country: &str) -> Result<Option<Series>, FetchError> {
        let body = self.dataset(ds).await?;
        Ok(filter_by_country(&body, country))
    }

    pub async fn latest(&self, ds: Dataset, country: &str) -> Result<Option<YearValue>, FetchError> {
        Ok(self.series(ds, country).await?.and_then(|s| s.latest()))
    }

    /// Annual, per-capita and growth figures fetched concurrently. A dataset
    /// that fails is logged and left empty.
    pub async fn profile(&self, country: &str) -> EmissionsProfile {
        let (annual, per_capita, growth) = tokio::join!(
            self.latest(Dataset::AnnualCo2, country),
            self.latest(Dataset::Co2PerCapita, country),
            self.latest(Dataset::Co2GrowthRate, country),
        );
        let keep = |ds: Dataset, r: Result<Option<YearValue>, FetchError>| match r {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(dataset = ds.slug(), error = %e, "emissions dataset unavailable");
                None
            }
        };
        EmissionsProfile {
            country: country.trim().to_string(),
            annual_co2: keep(Dataset::AnnualCo2, annual),
            co2_per_capita: keep(Dataset::Co2PerCapita, per_capita),
            co2_growth_pct: keep(Dataset::Co2GrowthRate, growth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body() -> Value {
        json!({
            "data": {
                "entities": [{"name": "India"}, {"name": "Kenya", "id": 42}],
                "values": [
                    {"entity": 0, "year": 2021, "value": 2.7e9},
                    {"entity": 0, "year": 2022, "value": 2.83e9},
                    {"entity": 0, "year": 2020, "value": 2.4e9},
                    {"entity": 42, "year": 2022, "value": 1.9e7},
                    {"entity": 1, "year": "bad", "value": 1.0}
                ]
            }
        })
    }

    #[test]
    fn slugs_round_trip() {
        for ds in Dataset::ALL {
            assert_eq!(Dataset::from_slug(ds.slug()), Some(ds));
        }
        assert_eq!(Dataset::from_slug("nope"), None);
    }

    #[test]
    fn lookup_is_case_insensitive_and_latest_is_max_year() {
        let s = filter_by_country(&body(), "INDIA").unwrap();
        assert_eq!(s.entity, "India");
        assert_eq!(s.points.len(), 3);
        assert_eq!(s.latest(), Some(YearValue { year: 2022, value: 2.83e9 }));
    }

    #[test]
    fn entity_ids_and_bad_rows() {
        let s = filter_by_country(&body(), "kenya").unwrap();
        assert_eq!(s.points, vec![YearValue { year: 2022, value: 1.9e7 }]);
        assert!(filter_by_country(&body(), "Atlantis").is_none());
        assert!(filter_by_country(&json!({}), "India").is_none());
    }

    #[test]
    fn id_colliding_with_another_index_does_not_merge_rows() {
        let body = json!({
            "entities": [{"name": "Chad", "id": 1}, {"name": "Peru", "id": 7}],
            "values": [
                {"entity": 0, "year": 2022, "value": 10.0},
                {"entity": 1, "year": 2022, "value": 20.0},
                {"entity": 7, "year": 2021, "value": 30.0}
            ]
        });
        let chad = filter_by_country(&body, "Chad").unwrap();
        assert_eq!(chad.points, vec![YearValue { year: 2022, value: 10.0 }]);
        let peru = filter_by_country(&body, "Peru").unwrap();
        assert_eq!(peru.points, vec![YearValue { year: 2022, value: 20.0 }]);
    }

    #[test]
    fn profile_snapshot_carries_region() {
        let p = EmissionsProfile {
            country: "India".into(),
            co2_per_capita: Some(YearValue { year: 2022, value: 2.0 }),
            ..EmissionsProfile::default()
        };
        let s = p.snapshot();
        assert_eq!(s.region.as_deref(), Some("India"));
        assert_eq!(s.co2_per_capita, Some(2.0));
        assert!(!p.is_empty());
    }
}
