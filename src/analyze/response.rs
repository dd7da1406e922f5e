// src/analyze/response.rs
//! The structured chat/analysis answer and its lenient construction from
//! loosely-shaped JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A cited source. Only `title` and `url` are expected; everything else is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reliability: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Dataset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub data: Vec<f64>,
    /// Single color or one color per point.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tension: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartData {
    #[serde(deserialize_with = "labels_lenient")]
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// Chart suggestion ("line", "bar", "doughnut", "scatter").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Visualization {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub chart_data: ChartData,
    pub insights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BTreeMap<String, Value>>,
}

/// Labels may arrive as numbers (years); they are kept as text.
fn labels_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let raw = Vec::<Value>::deserialize(d)?;
    Ok(raw
        .into_iter()
        .map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

/// Always-complete answer shape: missing parts default, never absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub content: String,
    pub sources: Vec<Source>,
    pub visualization: Option<Visualization>,
}

impl ParsedResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Build from any JSON object. Wrong-typed fields fall back to defaults;
    /// individual malformed sources are dropped.
    pub fn from_value(v: &Value) -> Self {
        let content = v
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            content,
            sources: sources_from_value(v.get("sources")),
            visualization: v
                .get("visualization")
                .filter(|x| x.is_object())
                .and_then(|x| serde_json::from_value(x.clone()).ok()),
        }
    }
}

pub(crate) fn sources_from_value(v: Option<&Value>) -> Vec<Source> {
    v.and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter(|s| s.is_object())
                .filter_map(|s| serde_json::from_value(s.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
