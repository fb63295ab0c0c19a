//! DOC 2.0: full-text article search and volume/tone timelines.

use super::{get_json, service_url};
use crate::error::Error;
use gdelt_files::Downloader;
use gdelt_model::records::{Article, TimelinePoint};
use gdelt_model::DocFilter;
use serde::Deserialize;

fn timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

fn doc_pairs(filter: &DocFilter, mode: &str) -> Vec<(String, String)> {
    let mut pairs = vec![
        ("query".to_string(), filter.query.clone()),
        ("mode".to_string(), mode.to_string()),
        ("format".to_string(), "json".to_string()),
    ];
    if let Some(timespan) = &filter.timespan {
        pairs.push(("timespan".to_string(), timespan.clone()));
    }
    if let Some(range) = &filter.range {
        pairs.push(("startdatetime".to_string(), timestamp(range.start)));
        pairs.push(("enddatetime".to_string(), timestamp(range.end)));
    }
    if let Some(max) = filter.max_records {
        pairs.push(("maxrecords".to_string(), max.to_string()));
    }
    if let Some(lang) = &filter.source_language {
        pairs.push(("sourcelang".to_string(), lang.clone()));
    }
    if let Some(country) = &filter.source_country {
        pairs.push(("sourcecountry".to_string(), country.clone()));
    }
    pairs
}

#[derive(Debug, Deserialize)]
struct ArticleListResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    timeline: Vec<TimelineSeries>,
}

#[derive(Debug, Deserialize)]
struct TimelineSeries {
    #[serde(default)]
    series: Option<String>,
    #[serde(default)]
    data: Vec<TimelineDatum>,
}

#[derive(Debug, Deserialize)]
struct TimelineDatum {
    date: String,
    value: f64,
}

pub(super) async fn articles(
    downloader: &Downloader,
    filter: &DocFilter,
) -> Result<Vec<Article>, Error> {
    let pairs = doc_pairs(filter, "artlist");
    let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let url = service_url("doc", &borrowed)?;
    let resp: ArticleListResponse = get_json(downloader, url).await?;
    Ok(resp.articles)
}

pub(super) async fn timeline(
    downloader: &Downloader,
    filter: &DocFilter,
) -> Result<Vec<TimelinePoint>, Error> {
    let pairs = doc_pairs(filter, filter.mode.as_param());
    let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let url = service_url("doc", &borrowed)?;
    let resp: TimelineResponse = get_json(downloader, url).await?;

    // Flatten the per-series nesting; each point remembers its series label.
    let points = resp
        .timeline
        .into_iter()
        .flat_map(|series| {
            let label = series.series;
            series.data.into_iter().map(move |datum| TimelinePoint {
                series: label.clone(),
                date: datum.date,
                value: datum.value,
            })
        })
        .collect();
    Ok(points)
}
