//! TV 2.0 and TV-AI 2.0: closed-caption clip search.
//!
//! Clip entries are folded into the [`Article`] shape: the station maps to
//! the domain field and the show name to the title.

use super::{get_json, service_url};
use crate::error::Error;
use gdelt_files::Downloader;
use gdelt_model::records::Article;
use gdelt_model::TvFilter;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ClipResponse {
    #[serde(default)]
    clips: Vec<Clip>,
}

#[derive(Debug, Deserialize)]
struct Clip {
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    station: Option<String>,
    #[serde(default)]
    show: Option<String>,
    #[serde(default)]
    preview_thumb: Option<String>,
}

pub(super) async fn clips(
    downloader: &Downloader,
    filter: &TvFilter,
    service: &str,
) -> Result<Vec<Article>, Error> {
    let mode = filter.mode.as_deref().unwrap_or("clipgallery");
    let mut query = filter.query.clone();
    // Station selectors ride inside the query expression, parenthesized so
    // they compose with the caller's terms.
    if !filter.stations.is_empty() {
        let stations: Vec<String> = filter
            .stations
            .iter()
            .map(|s| format!("station:{s}"))
            .collect();
        query = format!("{query} ({})", stations.join(" OR "));
    }

    let mut pairs = vec![
        ("query", query.as_str()),
        ("mode", mode),
        ("format", "json"),
    ];
    let max;
    if let Some(max_records) = filter.max_records {
        max = max_records.to_string();
        pairs.push(("maxrecords", max.as_str()));
    }
    let timespan;
    if let Some(span) = &filter.timespan {
        timespan = span.clone();
        pairs.push(("timespan", timespan.as_str()));
    }
    let url = service_url(service, &pairs)?;
    let resp: ClipResponse = get_json(downloader, url).await?;

    let articles = resp
        .clips
        .into_iter()
        .filter_map(|clip| {
            let url = clip.url.or(clip.preview_url)?;
            Some(Article {
                url,
                url_mobile: None,
                title: clip.show,
                seen_date: clip.date,
                social_image: clip.preview_thumb,
                domain: clip.station,
                language: None,
                source_country: None,
            })
        })
        .collect();
    Ok(articles)
}
