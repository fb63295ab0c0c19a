//! GEO 2.0: geographic search returning GeoJSON point features.

use super::{get_json, service_url};
use crate::error::Error;
use gdelt_files::Downloader;
use gdelt_model::records::GeoPoint;
use gdelt_model::GeoFilter;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Properties,
    geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    shareimage: Option<String>,
    #[serde(default)]
    html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// GeoJSON order: `[lon, lat]`.
    #[serde(default)]
    coordinates: Vec<f64>,
}

pub(super) async fn points(
    downloader: &Downloader,
    filter: &GeoFilter,
) -> Result<Vec<GeoPoint>, Error> {
    let mut pairs = vec![
        ("query", filter.query.as_str()),
        ("format", "geojson"),
    ];
    let max;
    if let Some(max_points) = filter.max_points {
        max = max_points.to_string();
        pairs.push(("maxpoints", max.as_str()));
    }
    let timespan;
    if let Some(span) = &filter.timespan {
        timespan = span.clone();
        pairs.push(("timespan", timespan.as_str()));
    }
    let url = service_url("geo", &pairs)?;
    let collection: FeatureCollection = get_json(downloader, url).await?;

    let points = collection
        .features
        .into_iter()
        .filter_map(|feature| {
            let coords = feature.geometry?.coordinates;
            let (lon, lat) = match coords.as_slice() {
                [lon, lat, ..] => (*lon, *lat),
                _ => return None,
            };
            Some(GeoPoint {
                name: feature.properties.name,
                lat,
                lon,
                count: feature.properties.count,
                share_image: feature.properties.shareimage,
                html: feature.properties.html,
            })
        })
        .collect();
    Ok(points)
}
