//! N-gram records. Web n-grams are JSON-lines; broadcast n-grams are TAB
//! rows from the TV (5 columns) and radio (6 columns, trailing show name)
//! inventories, unified under one validated shape.

use super::{map_string, opt_int};
use crate::raw::{RawRecord, TabRow};
use crate::RecordError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebNgram {
    /// Publication timestamp as published (YYYYMMDDHHMMSS).
    pub date: Option<String>,
    pub ngram: String,
    pub lang: Option<String>,
    /// 1 unigram, 2 bigram, and so on.
    #[serde(rename = "type")]
    pub ngram_type: Option<u8>,
    /// Word position within the document.
    pub pos: Option<u32>,
    /// Snippet preceding the n-gram.
    pub pre: Option<String>,
    /// Snippet following the n-gram.
    pub post: Option<String>,
    pub url: Option<String>,
}

impl WebNgram {
    pub fn from_raw(raw: &RawRecord) -> Result<WebNgram, RecordError> {
        let map = raw.as_map().ok_or(RecordError::WrongShape("JSON mapping"))?;
        let ngram = map_string(map, "ngram").ok_or(RecordError::MissingField("ngram"))?;
        let small_int = |key: &str| {
            map.get(key)
                .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        };
        Ok(WebNgram {
            date: map_string(map, "date"),
            ngram,
            lang: map_string(map, "lang"),
            ngram_type: small_int("type").map(|v| v as u8),
            pos: small_int("pos").map(|v| v as u32),
            pre: map_string(map, "pre"),
            post: map_string(map, "post"),
            url: map_string(map, "url"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastSource {
    Tv,
    Radio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastNgram {
    pub source: BroadcastSource,
    /// YYYYMMDDHHMMSS of the monitored broadcast window.
    pub date: Option<i64>,
    pub station: Option<String>,
    pub ngram: String,
    pub count: Option<u64>,
    pub doc_count: Option<u64>,
    /// Radio inventories append the show name as a trailing column.
    pub show: Option<String>,
}

const TV_COLUMNS: usize = 5;
const RADIO_COLUMNS: usize = 6;

impl BroadcastNgram {
    /// The source tag normally comes from the inventory being read; the
    /// column count is used when the caller has no better information.
    pub fn from_raw(raw: &RawRecord) -> Result<BroadcastNgram, RecordError> {
        let row = match raw {
            RawRecord::Row(row) => row,
            RawRecord::Map(_) => return Err(RecordError::WrongShape("TAB row")),
        };
        let source = match row.fields.len() {
            TV_COLUMNS => BroadcastSource::Tv,
            RADIO_COLUMNS => BroadcastSource::Radio,
            actual => {
                return Err(RecordError::ColumnCount {
                    expected: TV_COLUMNS,
                    actual,
                })
            }
        };
        Self::from_row(row, source)
    }

    pub fn from_row(row: &TabRow, source: BroadcastSource) -> Result<BroadcastNgram, RecordError> {
        if row.fields.len() != TV_COLUMNS && row.fields.len() != RADIO_COLUMNS {
            return Err(RecordError::ColumnCount {
                expected: TV_COLUMNS,
                actual: row.fields.len(),
            });
        }
        let ngram = row
            .get_owned(2)
            .ok_or(RecordError::MissingField("NGRAM"))?;
        Ok(BroadcastNgram {
            source,
            date: opt_int(row.get(0), 0, "DATE")?,
            station: row.get_owned(1),
            ngram,
            count: opt_int(row.get(3), 3, "COUNT")?,
            doc_count: opt_int(row.get(4), 4, "DOCCOUNT")?,
            show: row.get_owned(5),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::raw::FormatVersion;

    #[test]
    fn web_ngram_from_json_mapping() {
        let map = serde_json::from_value(serde_json::json!({
            "date": "20240115001500",
            "ngram": "ceasefire",
            "lang": "en",
            "type": 1,
            "pos": 88,
            "pre": "called for an immediate",
            "post": "in the region",
            "url": "https://example.com/story",
        }))
        .unwrap();
        let ngram = WebNgram::from_raw(&RawRecord::Map(map)).unwrap();
        assert_eq!(ngram.ngram, "ceasefire");
        assert_eq!(ngram.ngram_type, Some(1));
        assert_eq!(ngram.pos, Some(88));
    }

    #[test]
    fn radio_rows_carry_a_show() {
        let fields: Vec<String> = ["20240115001500", "KQED", "wildfire", "7", "3", "Morning Edition"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let raw = RawRecord::Row(TabRow::new(fields, FormatVersion::V2));
        let ngram = BroadcastNgram::from_raw(&raw).unwrap();
        assert_eq!(ngram.source, BroadcastSource::Radio);
        assert_eq!(ngram.show.as_deref(), Some("Morning Edition"));

        let tv: Vec<String> = ["20240115001500", "CNN", "wildfire", "7", "3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let raw = RawRecord::Row(TabRow::new(tv, FormatVersion::V2));
        let ngram = BroadcastNgram::from_raw(&raw).unwrap();
        assert_eq!(ngram.source, BroadcastSource::Tv);
        assert_eq!(ngram.show, None);
    }
}
