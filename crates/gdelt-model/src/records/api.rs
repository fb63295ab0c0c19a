//! Validated records for the REST API surface. These arrive as JSON and are
//! deserialized at the response boundary, so they are plain serde shapes with
//! the wire field names mapped onto library naming.

use serde::{Deserialize, Serialize};

/// One article from a DOC 2.0 `artlist` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    #[serde(default, rename = "url_mobile")]
    pub url_mobile: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// `YYYYMMDDTHHMMSSZ` as published by the API.
    #[serde(default, rename = "seendate")]
    pub seen_date: Option<String>,
    #[serde(default, rename = "socialimage")]
    pub social_image: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, rename = "sourcecountry")]
    pub source_country: Option<String>,
}

/// One point in a DOC 2.0 timeline response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// The series label the point belongs to (volume, tone, a language, ...).
    #[serde(default)]
    pub series: Option<String>,
    pub date: String,
    pub value: f64,
}

/// One mapped location from a GEO 2.0 response (a GeoJSON point feature).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    /// Number of matching articles mentioning the location.
    pub count: Option<u64>,
    pub share_image: Option<String>,
    /// Pre-rendered HTML snippet of top matches, as returned by the API.
    pub html: Option<String>,
}

/// One contextual snippet from a Context 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextResult {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "seendate")]
    pub seen_date: Option<String>,
    /// The matched passage with surrounding context.
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
}
