//! Thin wrappers over the GDELT REST API surface (DOC, GEO, Context, TV,
//! TV-AI).
//!
//! These endpoints serve JSON, not slot files, and the warehouse hosts none
//! of this content, so they do not participate in fallback. They share the
//! download path's retry/backoff machinery and URL safety checks; every
//! query-string value is URL-encoded by construction.

mod context;
mod doc;
mod geo;
mod tv;

use crate::client::GdeltClient;
use crate::error::Error;
use gdelt_files::Downloader;
use gdelt_model::records::{Article, ContextResult, GeoPoint, TimelinePoint};
use gdelt_model::{ContextFilter, DocFilter, DocMode, GeoFilter, TvFilter};
use url::Url;

const DEFAULT_API_BASE: &str = "https://api.gdeltproject.org/api/v2";

fn api_base() -> String {
    std::env::var("GDELT_API_ENDPOINT").unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
}

/// Builds `{base}/{service}/{service}` with the given query pairs, all
/// URL-encoded.
fn service_url(service: &str, pairs: &[(&str, &str)]) -> Result<Url, Error> {
    let base = api_base();
    let mut url = Url::parse(&format!("{base}/{service}/{service}")).map_err(|err| {
        Error::Endpoint {
            url: base.clone(),
            detail: format!("invalid API base: {err}"),
        }
    })?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

/// One GET through the shared retry machinery, decoded as JSON.
async fn get_json<T: serde::de::DeserializeOwned>(
    downloader: &Downloader,
    url: Url,
) -> Result<T, Error> {
    tracing::debug!(%url, "API request");
    match downloader.fetch(url.as_str()).await? {
        Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        None => Err(Error::Endpoint {
            url: url.to_string(),
            detail: "endpoint returned 404".to_string(),
        }),
    }
}

impl GdeltClient {
    /// DOC 2.0 article search (`mode=artlist`).
    pub async fn doc_articles(&self, filter: &DocFilter) -> Result<Vec<Article>, Error> {
        doc::articles(self.files().downloader(), filter).await
    }

    /// DOC 2.0 timeline modes. The filter's `mode` must be one of the
    /// timeline variants.
    pub async fn doc_timeline(&self, filter: &DocFilter) -> Result<Vec<TimelinePoint>, Error> {
        if filter.mode == DocMode::ArtList {
            return Err(Error::Config {
                detail: "doc_timeline requires a timeline mode".to_string(),
            });
        }
        doc::timeline(self.files().downloader(), filter).await
    }

    /// GEO 2.0 geographic search.
    pub async fn geo(&self, filter: &GeoFilter) -> Result<Vec<GeoPoint>, Error> {
        geo::points(self.files().downloader(), filter).await
    }

    /// Context 2.0 contextual snippet search.
    pub async fn context(&self, filter: &ContextFilter) -> Result<Vec<ContextResult>, Error> {
        context::matches(self.files().downloader(), filter).await
    }

    /// TV 2.0 clip search.
    pub async fn tv(&self, filter: &TvFilter) -> Result<Vec<Article>, Error> {
        tv::clips(self.files().downloader(), filter, "tv").await
    }

    /// TV-AI 2.0 clip search.
    pub async fn tv_ai(&self, filter: &TvFilter) -> Result<Vec<Article>, Error> {
        tv::clips(self.files().downloader(), filter, "tvai").await
    }
}
