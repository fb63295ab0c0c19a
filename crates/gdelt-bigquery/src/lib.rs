//! The warehouse source: a thin adapter over the BigQuery REST v2 surface.
//!
//! The adapter submits a parameterized query, polls it to completion, and
//! pages the result set as a lazy stream of column-keyed mappings. Queries
//! only ever reference the partitioned table variants and always carry a
//! `_PARTITIONTIME` bound; see [`query::QueryBuilder`].

pub mod api;
pub mod query;

mod auth;
mod error;
mod rows;

pub use auth::{resolve_credentials_path, Credentials, TokenProvider};
pub use error::WarehouseError;
pub use query::{QueryBuilder, Table};
pub use rows::RowStream;

use api::{QueryRequest, QueryResponse};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
/// How long one jobs.query / getQueryResults call may block server-side.
const CALL_TIMEOUT_MS: i64 = 10_000;

#[derive(Debug, Clone)]
pub struct BigQueryOptions {
    /// Project the query jobs are billed to.
    pub project_id: String,
    pub credentials: Credentials,
    /// Endpoint override, for emulators and tests.
    pub base_url: Option<String>,
    /// Overall per-query deadline. No default: callers opt in.
    pub query_timeout: Option<Duration>,
    pub location: Option<String>,
}

pub(crate) struct Inner {
    http: reqwest::Client,
    auth: Option<TokenProvider>,
    project_id: String,
    base_url: String,
    pub(crate) query_timeout: Option<Duration>,
}

impl Inner {
    async fn bearer(&self) -> Result<String, WarehouseError> {
        match &self.auth {
            Some(provider) => provider.bearer().await,
            None => Err(WarehouseError::MissingCredentials),
        }
    }

    async fn decode(resp: reqwest::Response) -> Result<QueryResponse, WarehouseError> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(WarehouseError::Api {
                status: status.as_u16(),
                message: message.chars().take(500).collect(),
            });
        }
        let decoded: QueryResponse = resp.json().await?;
        if let Some(err) = decoded.errors.first() {
            return Err(WarehouseError::Api {
                status: status.as_u16(),
                message: format!("{}: {}", err.reason, err.message),
            });
        }
        Ok(decoded)
    }

    async fn submit(&self, request: &QueryRequest) -> Result<QueryResponse, WarehouseError> {
        let token = self.bearer().await?;
        let url = format!("{}/projects/{}/queries", self.base_url, self.project_id);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        Self::decode(resp).await
    }

    pub(crate) async fn get_query_results(
        &self,
        job_id: &str,
        location: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, WarehouseError> {
        let token = self.bearer().await?;
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.base_url, self.project_id, job_id
        );
        let mut req = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("timeoutMs", CALL_TIMEOUT_MS.to_string())]);
        if let Some(location) = location {
            req = req.query(&[("location", location)]);
        }
        if let Some(page_token) = page_token {
            req = req.query(&[("pageToken", page_token)]);
        }
        Self::decode(req.send().await?).await
    }

    #[cfg(test)]
    pub(crate) fn stub() -> Arc<Inner> {
        Arc::new(Inner {
            http: reqwest::Client::new(),
            auth: None,
            project_id: "test".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            query_timeout: None,
        })
    }
}

/// Handle to the warehouse. Cheap to clone; the HTTP client and token cache
/// are shared.
#[derive(Clone)]
pub struct BigQueryClient {
    inner: Arc<Inner>,
    location: Option<String>,
}

impl BigQueryClient {
    pub fn new(options: BigQueryOptions) -> Result<BigQueryClient, WarehouseError> {
        let http = reqwest::Client::builder().build()?;
        let auth = Some(TokenProvider::new(options.credentials, http.clone()));
        Ok(BigQueryClient {
            inner: Arc::new(Inner {
                http,
                auth,
                project_id: options.project_id,
                base_url: options
                    .base_url
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                query_timeout: options.query_timeout,
            }),
            location: options.location,
        })
    }

    /// Submits `builder`'s query and returns the lazy row stream.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn query(&self, builder: QueryBuilder) -> Result<RowStream, WarehouseError> {
        let (sql, parameters) = builder.build()?;
        tracing::debug!(%sql, parameters = parameters.len(), "submitting warehouse query");

        let request = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            parameter_mode: Some("NAMED".to_string()),
            query_parameters: parameters,
            timeout_ms: Some(CALL_TIMEOUT_MS),
            max_results: None,
            location: self.location.clone(),
        };
        let first = self.inner.submit(&request).await?;

        let mut state = rows::PageState {
            client: self.inner.clone(),
            schema: Vec::new(),
            rows: VecDeque::new(),
            page_token: None,
            job_id: None,
            location: self.location.clone(),
            complete: false,
            started: Instant::now(),
        };
        state.absorb(first);
        Ok(rows::into_stream(state))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use futures::StreamExt;
    use gdelt_model::DateRange;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn range() -> DateRange {
        let start = chrono::Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        DateRange::new(start, start + chrono::Duration::days(1))
    }

    fn client_for(server: &MockServer) -> BigQueryClient {
        BigQueryClient::new(BigQueryOptions {
            project_id: "proj".to_string(),
            credentials: Credentials::Token("test-token".to_string()),
            base_url: Some(server.uri()),
            query_timeout: Some(Duration::from_secs(30)),
            location: None,
        })
        .unwrap()
    }

    fn page(job_complete: bool, rows: serde_json::Value, token: Option<&str>) -> serde_json::Value {
        let mut body = serde_json::json!({
            "jobReference": {"projectId": "proj", "jobId": "job-1"},
            "jobComplete": job_complete,
            "schema": {"fields": [
                {"name": "GLOBALEVENTID", "type": "INTEGER"},
                {"name": "EventCode", "type": "STRING"},
            ]},
            "rows": rows,
        });
        if let Some(token) = token {
            body["pageToken"] = serde_json::Value::String(token.to_string());
        }
        body
    }

    #[tokio::test]
    async fn submits_polls_and_pages() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/projects/proj/queries"))
            .and(body_partial_json(serde_json::json!({
                "parameterMode": "NAMED",
                "useLegacySql": false,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jobReference": {"projectId": "proj", "jobId": "job-1"},
                "jobComplete": false,
            })))
            .mount(&server)
            .await;

        // First poll completes with one row and a page token; the follow-up
        // page closes the stream.
        Mock::given(method("GET"))
            .and(path("/projects/proj/queries/job-1"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(
                true,
                serde_json::json!([{"f": [{"v": "7"}, {"v": "141"}]}]),
                None,
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/projects/proj/queries/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(
                true,
                serde_json::json!([{"f": [{"v": "42"}, {"v": "0251"}]}]),
                Some("p2"),
            )))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let stream = client
            .query(QueryBuilder::new(Table::Events, range()).columns(&["GLOBALEVENTID", "EventCode"]))
            .await
            .unwrap();
        let rows: Vec<_> = stream.collect().await;

        let maps: Vec<_> = rows
            .into_iter()
            .map(|r| r.unwrap())
            .map(|raw| raw.as_map().unwrap().clone())
            .collect();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[0]["EventCode"], "0251");
        assert_eq!(maps[1]["GLOBALEVENTID"], "7");
    }

    #[tokio::test]
    async fn api_errors_surface_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/projects/proj/queries"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = match client
            .query(QueryBuilder::new(Table::Events, range()))
            .await
        {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err, WarehouseError::Api { status: 403, .. }));
    }
}
