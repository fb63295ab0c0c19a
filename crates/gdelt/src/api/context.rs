//! Context 2.0: contextual snippet search.

use super::{get_json, service_url};
use crate::error::Error;
use gdelt_files::Downloader;
use gdelt_model::records::ContextResult;
use gdelt_model::ContextFilter;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ContextResponse {
    /// The service has shipped both field names over time.
    #[serde(default)]
    articles: Vec<ContextResult>,
    #[serde(default)]
    matches: Vec<ContextResult>,
}

pub(super) async fn matches(
    downloader: &Downloader,
    filter: &ContextFilter,
) -> Result<Vec<ContextResult>, Error> {
    let mut pairs = vec![
        ("query", filter.query.as_str()),
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
    let url = service_url("context", &pairs)?;
    let mut resp: ContextResponse = get_json(downloader, url).await?;
    let mut results = std::mem::take(&mut resp.articles);
    results.append(&mut resp.matches);
    Ok(results)
}
