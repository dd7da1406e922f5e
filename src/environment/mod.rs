// src/environment/mod.rs
//! Metric sources: air quality stations (WAQI and OpenAQ), weather, national
//! emissions datasets and geocoding. Each client returns vendor data already normalized into a
//! `MetricSnapshot`-compatible shape.

pub mod emissions;
pub mod geocode;
pub mod openaq;
pub mod waqi;
pub mod weather;

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::FetchError;

pub use emissions::{Dataset, EmissionsClient, EmissionsProfile};
pub use geocode::{Geocoder, Location};
pub use openaq::{station_alerts, OpenAqClient, Station};
pub use waqi::{aqi_info, pollutant_details, AirReading, WaqiClient};
pub use weather::{AirPollution, OpenWeatherClient, Timed, WeatherReport};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("env_fetch_total", "Metric source requests, labeled by source.");
        describe_counter!("env_fetch_errors_total", "Metric source failures, labeled by source.");
        describe_histogram!("env_fetch_ms", "Metric source latency in milliseconds.");
    });
}

pub(crate) fn observe<T>(source: &'static str, started: Instant, res: &Result<T, FetchError>) {
    ensure_metrics_described();
    counter!("env_fetch_total", "source" => source).increment(1);
    histogram!("env_fetch_ms", "source" => source).record(started.elapsed().as_secs_f64() * 1_000.0);
    if let Err(e) = res {
        counter!("env_fetch_errors_total", "source" => source).increment(1);
        tracing::warn!(provider = source, error = %e, "metric source failed");
    }
}

/// All metric clients sharing one HTTP client.
pub struct EnvironmentSources {
    pub waqi: WaqiClient,
    pub weather: OpenWeatherClient,
    pub openaq: OpenAqClient,
    pub emissions: EmissionsClient,
    pub geocoder: Geocoder,
}

impl EnvironmentSources {
    pub fn from_config(cfg: &Config, client: reqwest::Client) -> Self {
        let ep = &cfg.endpoints;
        Self {
            waqi: WaqiClient::new(
                client.clone(),
                ep.waqi.clone(),
                cfg.keys.waqi_token.clone(),
                cfg.fetch_timeout,
            )
            .with_cache(TtlCache::new(), cfg.air_cache_ttl),
            weather: OpenWeatherClient::new(
                client.clone(),
                ep.openweather.clone(),
                cfg.keys.openweather.clone(),
                cfg.fetch_timeout,
            ),
            openaq: OpenAqClient::new(
                client.clone(),
                ep.openaq.clone(),
                cfg.keys.openaq.clone(),
                cfg.fetch_timeout,
            ),
            emissions: EmissionsClient::new(
                client.clone(),
                ep.owid.clone(),
                cfg.fetch_timeout,
                TtlCache::new(),
                cfg.emissions_cache_ttl,
            ),
            geocoder: Geocoder::new(client, ep.nominatim.clone()),
        }
    }
}
