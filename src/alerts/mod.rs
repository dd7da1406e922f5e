// src/alerts/mod.rs
//! Alert aggregation for one location: station air quality, nearby OpenAQ
//! particulate readings, current weather, national emissions and urgent local
//! news, each evaluated on its own so a failing source only removes its own
//! alerts. When WAQI is down, OpenWeather's pollutant sample stands in for it.

pub mod rules;

use std::sync::Arc;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;

use chrono::Utc;

use crate::environment::{station_alerts, EnvironmentSources, Location};
use crate::ingest::classify::is_urgent_headline;
use crate::ingest::feed::NewsService;
use crate::ingest::types::Record;

pub use rules::{evaluate, AlertRecord, Category, MetricSnapshot, Severity};

pub const MAX_NEWS_ALERTS: usize = 3;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("alerts_emitted_total", "Alerts produced, labeled by category.");
    });
}

/// Alerts plus the location they were computed for.
#[derive(Debug, Clone, Serialize)]
pub struct AlertBundle {
    pub location: Location,
    pub alerts: Vec<AlertRecord>,
}

/// Up to `MAX_NEWS_ALERTS` ecosystem alerts from urgent headlines.
pub fn news_alerts(articles: &[Record]) -> Vec<AlertRecord> {
    articles
        .iter()
        .filter(|a| is_urgent_headline(&a.title))
        .take(MAX_NEWS_ALERTS)
        .map(|a| {
            AlertRecord::new(
                Severity::High,
                Category::Ecosystem,
                a.title.clone(),
                a.description
                    .clone()
                    .unwrap_or_else(|| "Click to read more".to_string()),
                "🌍",
            )
        })
        .collect()
}

pub struct AlertService {
    env: Arc<EnvironmentSources>,
    news: Arc<NewsService>,
}

impl AlertService {
    pub fn new(env: Arc<EnvironmentSources>, news: Arc<NewsService>) -> Self {
        ensure_metrics_described();
        Self { env, news }
    }

    /// Alerts for `(lat, lon)`. `location` overrides the geocoded place name
    /// used for the news search. Never fails; unavailable sources simply
    /// contribute nothing.
    pub async fn comprehensive_alerts(&self, lat: f64, lon: f64, location: Option<&str>) -> AlertBundle {
        let (air, stations, weather, place) = tokio::join!(
            self.env.waqi.by_coords(lat, lon),
            self.env.openaq.nearby(lat, lon),
            self.env.weather.current(lat, lon),
            self.env.geocoder.reverse(lat, lon),
        );
        let air = match air {
            Ok(reading) => Ok(reading.snapshot()),
            Err(_) => self
                .env
                .weather
                .air_pollution(lat, lon)
                .await
                .map(|a| a.snapshot()),
        };

        let news_place = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(place.name.as_str())
            .to_string();

        let emissions = async {
            match place.country.as_deref() {
                Some(country) => Some(self.env.emissions.profile(country).await),
                None => None,
            }
        };
        let news = self.news.news_by_location(&news_place, 10);
        let (emissions, news) = tokio::join!(emissions, news);

        let mut alerts = Vec::new();
        if let Ok(snapshot) = &air {
            alerts.extend(evaluate(snapshot));
        }
        if let Ok(stations) = &stations {
            alerts.extend(station_alerts(stations, Utc::now()));
        }
        if let Ok(report) = &weather {
            alerts.extend(evaluate(&report.snapshot()));
        }
        if let Some(profile) = emissions.filter(|p| !p.is_empty()) {
            alerts.extend(evaluate(&profile.snapshot()));
        }
        alerts.extend(news_alerts(&news.articles));

        for a in &alerts {
            counter!("alerts_emitted_total", "category" => category_label(a.category)).increment(1);
        }
        tracing::info!(
            air_ok = air.is_ok(),
            stations = stations.as_ref().map_or(0, Vec::len),
            weather_ok = weather.is_ok(),
            resolved = place.resolved,
            alerts = alerts.len(),
            "alerts computed"
        );
        AlertBundle {
            location: place,
            alerts,
        }
    }
}

fn category_label(c: Category) -> &'static str {
    match c {
        Category::Air => "air",
        Category::Water => "water",
        Category::Heat => "heat",
        Category::Storm => "storm",
        Category::Weather => "weather",
        Category::Emissions => "emissions",
        Category::Ecosystem => "ecosystem",
        Category::System => "system",
    }
}
