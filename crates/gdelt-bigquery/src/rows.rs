//! Lazy row delivery: one `jobs.query` submission, completion polling, and
//! `getQueryResults` paging behind a `futures::Stream` of raw mappings.

use crate::api::{QueryResponse, TableRow};
use crate::error::WarehouseError;
use crate::Inner;
use futures::Stream;
use gdelt_model::RawRecord;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// A lazy sequence of column-name → value mappings, one per result row.
pub type RowStream = Pin<Box<dyn Stream<Item = Result<RawRecord, WarehouseError>> + Send>>;

pub(crate) struct PageState {
    pub(crate) client: Arc<Inner>,
    pub(crate) schema: Vec<String>,
    pub(crate) rows: VecDeque<TableRow>,
    pub(crate) page_token: Option<String>,
    pub(crate) job_id: Option<String>,
    pub(crate) location: Option<String>,
    pub(crate) complete: bool,
    pub(crate) started: Instant,
}

impl PageState {
    pub(crate) fn absorb(&mut self, resp: QueryResponse) {
        if let Some(schema) = resp.schema {
            self.schema = schema.fields.into_iter().map(|f| f.name).collect();
        }
        if let Some(job) = resp.job_reference {
            self.job_id = Some(job.job_id);
            self.location = job.location.or(self.location.take());
        }
        self.complete = resp.job_complete;
        self.page_token = resp.page_token;
        self.rows.extend(resp.rows);
    }

    fn row_to_map(&self, row: TableRow) -> Map<String, Value> {
        let mut map = Map::with_capacity(self.schema.len());
        for (name, cell) in self.schema.iter().zip(row.f) {
            map.insert(name.clone(), cell.v);
        }
        map
    }
}

pub(crate) fn into_stream(state: PageState) -> RowStream {
    Box::pin(futures::stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(row) = state.rows.pop_front() {
                let map = state.row_to_map(row);
                return Ok(Some((RawRecord::Map(map), state)));
            }

            if !state.complete {
                // The job is still running; keep polling getQueryResults
                // until it reports completion.
                if let Some(deadline) = state.client.query_timeout {
                    if state.started.elapsed() > deadline {
                        return Err(WarehouseError::QueryTimeout);
                    }
                }
                let job_id = state.job_id.clone().ok_or_else(|| WarehouseError::Api {
                    status: 200,
                    message: "incomplete job without a job reference".to_string(),
                })?;
                let resp = state
                    .client
                    .get_query_results(&job_id, state.location.as_deref(), None)
                    .await?;
                state.absorb(resp);
                continue;
            }

            let Some(token) = state.page_token.take() else {
                return Ok(None);
            };
            let job_id = state.job_id.clone().ok_or_else(|| WarehouseError::Api {
                status: 200,
                message: "paged results without a job reference".to_string(),
            })?;
            tracing::debug!(job = %job_id, "fetching next result page");
            let resp = state
                .client
                .get_query_results(&job_id, state.location.as_deref(), Some(&token))
                .await?;
            state.absorb(resp);
        }
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::{TableCell, TableFieldSchema, TableSchema};

    #[test]
    fn rows_map_by_schema_position() {
        let state = PageState {
            client: crate::Inner::stub(),
            schema: vec!["GLOBALEVENTID".to_string(), "EventCode".to_string()],
            rows: VecDeque::new(),
            page_token: None,
            job_id: None,
            location: None,
            complete: true,
            started: Instant::now(),
        };
        let row = TableRow {
            f: vec![
                TableCell {
                    v: Value::String("42".to_string()),
                },
                TableCell {
                    v: Value::String("0251".to_string()),
                },
            ],
        };
        let map = state.row_to_map(row);
        assert_eq!(map["GLOBALEVENTID"], "42");
        assert_eq!(map["EventCode"], "0251");
    }

    #[test]
    fn absorb_keeps_schema_across_pages() {
        let mut state = PageState {
            client: crate::Inner::stub(),
            schema: vec!["a".to_string()],
            rows: VecDeque::new(),
            page_token: None,
            job_id: Some("job".to_string()),
            location: None,
            complete: true,
            started: Instant::now(),
        };
        // Later pages omit the schema; the first page's mapping survives.
        state.absorb(QueryResponse {
            job_complete: true,
            rows: vec![TableRow { f: vec![] }],
            ..Default::default()
        });
        assert_eq!(state.schema, vec!["a".to_string()]);

        state.absorb(QueryResponse {
            job_complete: true,
            schema: Some(TableSchema {
                fields: vec![TableFieldSchema {
                    name: "b".to_string(),
                    kind: "STRING".to_string(),
                }],
            }),
            ..Default::default()
        });
        assert_eq!(state.schema, vec!["b".to_string()]);
    }
}
