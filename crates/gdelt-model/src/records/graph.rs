//! The six graph datasets.
//!
//! Five are JSON-lines and share a loose shape: a timestamp, a source URL,
//! a language, and a dataset-specific payload. Upstream adds keys to these
//! datasets without notice, so the known-key lists here are the contract the
//! parser enforces drift warnings against. The sixth, the Global Frontpage
//! Graph, is TAB-separated.

use super::map_string;
use crate::raw::{RawRecord, TabRow};
use crate::{RecordError, RecordType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys the library understands for each JSON-lines graph dataset. Anything
/// else in an upstream record is schema drift: warned once, then discarded.
pub fn known_fields(record_type: RecordType) -> &'static [&'static str] {
    match record_type {
        RecordType::QuoteGraph => &["date", "url", "lang", "quote", "context", "offset", "length"],
        RecordType::EntityGraph => &["date", "url", "lang", "entities"],
        RecordType::GeoGraph => &["date", "url", "lang", "locations"],
        RecordType::EmbeddedMetadataGraph => &[
            "date",
            "url",
            "lang",
            "title",
            "description",
            "metaTags",
            "socialEmbeds",
        ],
        RecordType::ArticleListGraph => &["date", "url", "lang", "title", "domain", "image"],
        _ => &[],
    }
}

/// A validated record from one of the five JSON-lines graph datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub record_type: RecordType,
    pub date: Option<String>,
    pub url: Option<String>,
    pub lang: Option<String>,
    /// Dataset-specific fields, already filtered to the known-key list.
    pub payload: Map<String, Value>,
}

impl GraphRecord {
    pub fn from_raw(record_type: RecordType, raw: &RawRecord) -> Result<GraphRecord, RecordError> {
        let map = raw.as_map().ok_or(RecordError::WrongShape("JSON mapping"))?;
        let mut payload = Map::new();
        for key in known_fields(record_type) {
            if matches!(*key, "date" | "url" | "lang") {
                continue;
            }
            if let Some(value) = map.get(*key) {
                if !value.is_null() {
                    payload.insert((*key).to_string(), value.clone());
                }
            }
        }
        Ok(GraphRecord {
            record_type,
            date: map_string(map, "date"),
            url: map_string(map, "url"),
            lang: map_string(map, "lang"),
            payload,
        })
    }
}

/// One outlink observed on a monitored frontpage (the TAB-separated Global
/// Frontpage Graph).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontpageLink {
    /// YYYYMMDDHHMMSS of the hourly crawl.
    pub date: Option<i64>,
    pub frontpage_url: Option<String>,
    /// 1-based position of the link on the page.
    pub position: Option<u32>,
    pub link_url: String,
    pub link_text: Option<String>,
}

pub(crate) const GFG_COLUMNS: usize = 5;

impl FrontpageLink {
    pub fn from_raw(raw: &RawRecord) -> Result<FrontpageLink, RecordError> {
        let row = match raw {
            RawRecord::Row(row) => row,
            RawRecord::Map(_) => return Err(RecordError::WrongShape("TAB row")),
        };
        Self::from_row(row)
    }

    fn from_row(row: &TabRow) -> Result<FrontpageLink, RecordError> {
        if row.fields.len() != GFG_COLUMNS {
            return Err(RecordError::ColumnCount {
                expected: GFG_COLUMNS,
                actual: row.fields.len(),
            });
        }
        let link_url = row
            .get_owned(3)
            .ok_or(RecordError::MissingField("LINKURL"))?;
        Ok(FrontpageLink {
            date: super::opt_int(row.get(0), 0, "DATE")?,
            frontpage_url: row.get_owned(1),
            position: super::opt_int(row.get(2), 2, "LINKPOS")?,
            link_url,
            link_text: row.get_owned(4),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payload_is_limited_to_known_fields() {
        // The parser is responsible for drift warnings; from_raw just never
        // lets an unknown key through.
        let map = serde_json::from_value(serde_json::json!({
            "date": "20240115001500",
            "url": "https://example.com/story",
            "lang": "en",
            "quote": "we will rebuild",
            "sentiment": 0.7,
        }))
        .unwrap();
        let record = GraphRecord::from_raw(RecordType::QuoteGraph, &RawRecord::Map(map)).unwrap();
        assert_eq!(record.payload.get("quote").unwrap(), "we will rebuild");
        assert!(record.payload.get("sentiment").is_none());
        assert_eq!(record.lang.as_deref(), Some("en"));
    }
}
