// src/alerts/rules.rs
//! Threshold rules over one normalized metric snapshot.
//!
//! Every numeric boundary is exclusive: a reading exactly on a threshold does
//! not fire it. Rules are independent of each other, except that tiers of the
//! same metric form one `if / else if` chain so a metric yields at most one
//! alert per direction. A metric absent from the snapshot yields nothing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Air,
    Water,
    Heat,
    Storm,
    Weather,
    Emissions,
    Ecosystem,
    System,
}

/// One alert banner. Built per request and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub severity: Severity,
    pub category: Category,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl AlertRecord {
    pub fn new(
        severity: Severity,
        category: Category,
        title: impl Into<String>,
        message: impl Into<String>,
        icon: &str,
    ) -> Self {
        Self {
            severity,
            category,
            title: title.into(),
            message: message.into(),
            icon: (!icon.is_empty()).then(|| icon.to_string()),
        }
    }
}

/// Normalized metric bag. Units: pollutants as reported by the air source
/// (µg/m³ for particulates, ppb for gases), temperature °C, wind m/s,
/// humidity %, emissions in tonnes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub aqi: Option<f64>,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub o3: Option<f64>,
    pub no2: Option<f64>,
    pub temperature: Option<f64>,
    /// Apparent temperature, °C.
    pub feels_like: Option<f64>,
    pub wind_speed: Option<f64>,
    pub humidity: Option<f64>,
    /// Main weather condition, e.g. "Rain" or "Thunderstorm".
    pub condition: Option<String>,
    pub co2_growth_pct: Option<f64>,
    pub co2_per_capita: Option<f64>,
    pub annual_co2: Option<f64>,
    /// Name used in emissions messages.
    pub region: Option<String>,
}

impl MetricSnapshot {
    /// Field-wise merge; values already present in `self` win.
    pub fn merge(mut self, other: MetricSnapshot) -> Self {
        macro_rules! fill {
            ($($f:ident),*) => { $( if self.$f.is_none() { self.$f = other.$f; } )* };
        }
        fill!(
            aqi,
            pm25,
            pm10,
            o3,
            no2,
            temperature,
            feels_like,
            wind_speed,
            humidity,
            condition,
            co2_growth_pct,
            co2_per_capita,
            annual_co2,
            region
        );
        self
    }
}

fn aqi_alert(aqi: f64) -> Option<AlertRecord> {
    let (severity, title, detail, icon) = if aqi > 300.0 {
        (
            Severity::Critical,
            "Hazardous Air Quality",
            "Health warnings of emergency conditions. Everyone may experience serious health effects.",
            "☠️",
        )
    } else if aqi > 200.0 {
        (
            Severity::High,
            "Very Unhealthy Air",
            "Health alert: everyone may experience more serious health effects.",
            "🔴",
        )
    } else if aqi > 150.0 {
        (
            Severity::High,
            "Unhealthy Air Quality",
            "Everyone may begin to experience health effects; sensitive groups at greater risk.",
            "🟠",
        )
    } else if aqi > 100.0 {
        (
            Severity::Medium,
            "Unhealthy for Sensitive Groups",
            "Members of sensitive groups may experience health effects.",
            "🟡",
        )
    } else if aqi > 50.0 {
        (
            Severity::Low,
            "Moderate Air Quality",
            "Air quality is acceptable. Sensitive individuals should consider limiting prolonged outdoor exertion.",
            "🟢",
        )
    } else {
        return None;
    };
    Some(AlertRecord::new(
        severity,
        Category::Air,
        title,
        format!("AQI: {aqi} - {detail}"),
        icon,
    ))
}

fn pollutant_alerts(s: &MetricSnapshot, out: &mut Vec<AlertRecord>) {
    if let Some(v) = s.pm25.filter(|v| *v > 55.0) {
        out.push(AlertRecord::new(
            Severity::Medium,
            Category::Air,
            "High PM2.5 Levels",
            format!("PM2.5: {v} µg/m³ - Fine particulate matter levels are elevated."),
            "🌫️",
        ));
    }
    if let Some(v) = s.pm10.filter(|v| *v > 154.0) {
        out.push(AlertRecord::new(
            Severity::Medium,
            Category::Air,
            "High PM10 Levels",
            format!("PM10: {v} µg/m³ - Coarse particulate matter levels are elevated."),
            "🌫️",
        ));
    }
    if let Some(v) = s.o3.filter(|v| *v > 100.0) {
        out.push(AlertRecord::new(
            Severity::Medium,
            Category::Air,
            "High Ozone Levels",
            format!("O3: {v} ppb - Ground-level ozone is elevated. Avoid outdoor activities during peak hours."),
            "☀️",
        ));
    }
    if let Some(v) = s.no2.filter(|v| *v > 100.0) {
        out.push(AlertRecord::new(
            Severity::Medium,
            Category::Air,
            "High Nitrogen Dioxide",
            format!("NO2: {v} ppb - Traffic-related pollution is elevated."),
            "🚗",
        ));
    }
}

fn weather_alerts(s: &MetricSnapshot, out: &mut Vec<AlertRecord>) {
    let t = s.temperature;
    let feels = s.feels_like;
    let hotter = |temp: f64, apparent: f64| {
        t.is_some_and(|v| v > temp) || feels.is_some_and(|v| v > apparent)
    };
    if hotter(35.0, 38.0) {
        out.push(AlertRecord::new(
            Severity::High,
            Category::Heat,
            "Extreme Heat Warning",
            format!("{}. Stay hydrated and avoid direct sunlight.", heat_reading(t, feels)),
            "🌡️",
        ));
    } else if hotter(30.0, 33.0) {
        out.push(AlertRecord::new(
            Severity::Medium,
            Category::Heat,
            "High Temperature",
            format!("{}. Take precautions in the heat.", heat_reading(t, feels)),
            "☀️",
        ));
    }
    if let Some(t) = t.filter(|t| *t < 0.0) {
        out.push(AlertRecord::new(
            Severity::Medium,
            Category::Weather,
            "Freezing Temperature",
            format!("Temperature is {t:.1}°C. Risk of ice formation."),
            "🥶",
        ));
    }

    if let Some(h) = s.humidity.filter(|h| *h > 80.0) {
        out.push(AlertRecord::new(
            Severity::Medium,
            Category::Weather,
            "High Humidity",
            format!("Humidity is {h}%. Discomfort and mold risk."),
            "💧",
        ));
    }

    if let Some(w) = s.wind_speed {
        if w > 15.0 {
            out.push(AlertRecord::new(
                Severity::High,
                Category::Storm,
                "Strong Winds",
                format!("Wind speed is {w:.1} m/s. Secure loose objects."),
                "🌬️",
            ));
        } else if w > 10.0 {
            out.push(AlertRecord::new(
                Severity::Medium,
                Category::Storm,
                "Windy Conditions",
                format!("Wind speed is {w:.1} m/s"),
                "🌬️",
            ));
        }
    }

    if let Some(cond) = s.condition.as_deref().map(str::to_lowercase) {
        if cond.contains("thunderstorm") {
            out.push(AlertRecord::new(
                Severity::High,
                Category::Storm,
                "Thunderstorm Alert",
                "Thunderstorms in the area. Stay indoors and avoid open areas.",
                "⚡",
            ));
        } else if cond.contains("rain") {
            out.push(AlertRecord::new(
                Severity::Medium,
                Category::Weather,
                "Rainy Weather",
                "Rain expected. Carry an umbrella and drive carefully.",
                "☔",
            ));
        }
    }
}

fn heat_reading(t: Option<f64>, feels: Option<f64>) -> String {
    match (t, feels) {
        (Some(t), Some(f)) => format!("Temperature is {t:.1}°C (feels like {f:.1}°C)"),
        (Some(t), None) => format!("Temperature is {t:.1}°C"),
        (None, Some(f)) => format!("It feels like {f:.1}°C"),
        (None, None) => "Temperature is high".to_string(),
    }
}

fn emissions_alerts(s: &MetricSnapshot, out: &mut Vec<AlertRecord>) {
    let region = s.region.as_deref().unwrap_or("This region");
    if let Some(g) = s.co2_growth_pct.filter(|g| *g > 3.0) {
        out.push(AlertRecord::new(
            Severity::High,
            Category::Emissions,
            "Rapid CO₂ Growth",
            format!("{region} has experienced {g:.1}% annual CO₂ growth"),
            "⚠️",
        ));
    }
    if let Some(p) = s.co2_per_capita.filter(|p| *p > 8.0) {
        out.push(AlertRecord::new(
            Severity::Medium,
            Category::Emissions,
            "High Per Capita Emissions",
            format!("{region} emits {p:.1} tonnes CO₂ per person"),
            "🏭",
        ));
    }
    if let Some(a) = s.annual_co2.filter(|a| *a > 1e9) {
        out.push(AlertRecord::new(
            Severity::High,
            Category::Emissions,
            "Very High Annual Emissions",
            format!("{region} emitted {:.2} billion tonnes of CO₂ last year", a / 1e9),
            "🏭",
        ));
    }
}

/// All alerts the snapshot triggers, in rule-table order. Never fails.
pub fn evaluate(snapshot: &MetricSnapshot) -> Vec<AlertRecord> {
    let mut out = Vec::new();
    if let Some(aqi) = snapshot.aqi {
        out.extend(aqi_alert(aqi));
    }
    pollutant_alerts(snapshot, &mut out);
    weather_alerts(snapshot, &mut out);
    emissions_alerts(snapshot, &mut out);
    out
}
