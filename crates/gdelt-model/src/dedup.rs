//! Deduplication key derivation.
//!
//! Keys are computed from raw records, before validated-record construction,
//! so duplicate rows cost only a split and a hash. The five strategies form a
//! strictness ladder; each one folds more fields into the key.

use crate::raw::{FormatVersion, RawRecord, TabRow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    UrlOnly,
    UrlDate,
    #[default]
    UrlDateLocation,
    UrlDateLocationActors,
    /// Everything above plus the CAMEO root code.
    Aggressive,
}

/// A dedup key: the strategy-selected fields joined with an unambiguous
/// separator. Two records are duplicates iff their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Column offsets in the events v2 (61-column) layout.
const V2_DAY: usize = 1;
const V2_ACTOR1_CODE: usize = 5;
const V2_ACTOR2_CODE: usize = 15;
const V2_EVENT_ROOT_CODE: usize = 28;
const V2_ACTION_GEO_FULLNAME: usize = 52;
const V2_ACTION_GEO_LAT: usize = 56;
const V2_ACTION_GEO_LON: usize = 57;
const V2_SOURCE_URL: usize = 60;

// And in the v1 (57-column) layout, which drops the ADM2 columns and the
// source URL.
const V1_ACTION_GEO_FULLNAME: usize = 50;
const V1_ACTION_GEO_LAT: usize = 53;
const V1_ACTION_GEO_LON: usize = 54;

struct KeyParts {
    url: String,
    date: Option<String>,
    location: Option<String>,
    actors: Option<String>,
    root_code: Option<String>,
}

fn row_parts(row: &TabRow) -> Option<KeyParts> {
    let (fullname, lat, lon, url) = match row.version {
        FormatVersion::V2 => (
            V2_ACTION_GEO_FULLNAME,
            V2_ACTION_GEO_LAT,
            V2_ACTION_GEO_LON,
            row.get(V2_SOURCE_URL),
        ),
        FormatVersion::V1 => (
            V1_ACTION_GEO_FULLNAME,
            V1_ACTION_GEO_LAT,
            V1_ACTION_GEO_LON,
            // v1 files carry no source URL; the event id stands in so that
            // url-keyed strategies still distinguish events.
            row.get(0),
        ),
    };
    let url = url?.to_string();
    let location = match (row.get(lat), row.get(lon)) {
        (Some(lat), Some(lon)) => Some(format!("{lat},{lon}")),
        _ => row.get(fullname).map(|s| s.to_string()),
    };
    let actors = match (row.get(V2_ACTOR1_CODE), row.get(V2_ACTOR2_CODE)) {
        (None, None) => None,
        (a1, a2) => Some(format!("{}~{}", a1.unwrap_or(""), a2.unwrap_or(""))),
    };
    Some(KeyParts {
        url,
        date: row.get(V2_DAY).map(|s| s.to_string()),
        location,
        actors,
        root_code: row.get(V2_EVENT_ROOT_CODE).map(|s| s.to_string()),
    })
}

fn map_parts(raw: &RawRecord) -> Option<KeyParts> {
    let url = ["SOURCEURL", "DocumentIdentifier", "url"]
        .iter()
        .find_map(|k| raw.map_str(k))?;
    let date = ["Day", "SQLDATE", "DATE", "date"]
        .iter()
        .find_map(|k| raw.map_str(k));
    let location = match (
        raw.map_str("ActionGeo_Lat"),
        raw.map_str("ActionGeo_Long"),
    ) {
        (Some(lat), Some(lon)) => Some(format!("{lat},{lon}")),
        _ => raw.map_str("ActionGeo_FullName"),
    };
    let actors = match (raw.map_str("Actor1Code"), raw.map_str("Actor2Code")) {
        (None, None) => None,
        (a1, a2) => Some(format!("{}~{}", a1.unwrap_or_default(), a2.unwrap_or_default())),
    };
    Some(KeyParts {
        url,
        date,
        location,
        actors,
        root_code: raw.map_str("EventRootCode"),
    })
}

impl DedupStrategy {
    /// Derives the dedup key for `raw`, or `None` when the record carries no
    /// keyable identity (such records are always passed through).
    pub fn key_for(&self, raw: &RawRecord) -> Option<DedupKey> {
        let parts = match raw {
            RawRecord::Row(row) => row_parts(row),
            RawRecord::Map(_) => map_parts(raw),
        }?;

        let mut key = parts.url;
        if *self >= DedupStrategy::UrlDate {
            key.push('\u{1f}');
            key.push_str(parts.date.as_deref().unwrap_or(""));
        }
        if *self >= DedupStrategy::UrlDateLocation {
            key.push('\u{1f}');
            key.push_str(parts.location.as_deref().unwrap_or(""));
        }
        if *self >= DedupStrategy::UrlDateLocationActors {
            key.push('\u{1f}');
            key.push_str(parts.actors.as_deref().unwrap_or(""));
        }
        if *self == DedupStrategy::Aggressive {
            key.push('\u{1f}');
            key.push_str(parts.root_code.as_deref().unwrap_or(""));
        }
        Some(DedupKey(key))
    }
}

// Strategies are ordered by strictness so that the ladder above can use
// comparisons instead of repeating match arms.
impl PartialOrd for DedupStrategy {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.rank().cmp(&other.rank()))
    }
}

impl Ord for DedupStrategy {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl DedupStrategy {
    fn rank(&self) -> u8 {
        match self {
            DedupStrategy::UrlOnly => 0,
            DedupStrategy::UrlDate => 1,
            DedupStrategy::UrlDateLocation => 2,
            DedupStrategy::UrlDateLocationActors => 3,
            DedupStrategy::Aggressive => 4,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn event_row(url: &str, day: &str, lat: &str, lon: &str, root: &str) -> RawRecord {
        let mut fields = vec![String::new(); 61];
        fields[0] = "123".to_string();
        fields[V2_DAY] = day.to_string();
        fields[V2_ACTOR1_CODE] = "USA".to_string();
        fields[V2_ACTOR2_CODE] = "RUS".to_string();
        fields[V2_EVENT_ROOT_CODE] = root.to_string();
        fields[V2_ACTION_GEO_LAT] = lat.to_string();
        fields[V2_ACTION_GEO_LON] = lon.to_string();
        fields[V2_SOURCE_URL] = url.to_string();
        RawRecord::Row(TabRow::new(fields, FormatVersion::V2))
    }

    #[test]
    fn stricter_strategies_split_more_keys() {
        let a = event_row("http://example.com/a", "20240115", "38.9", "-77.0", "01");
        let b = event_row("http://example.com/a", "20240115", "38.9", "-77.0", "14");

        let loose = DedupStrategy::UrlDateLocation;
        assert_eq!(loose.key_for(&a), loose.key_for(&b));

        let strict = DedupStrategy::Aggressive;
        assert_ne!(strict.key_for(&a), strict.key_for(&b));
    }

    #[test]
    fn map_records_key_on_document_identifier() {
        let mut map = serde_json::Map::new();
        map.insert(
            "DocumentIdentifier".to_string(),
            serde_json::Value::String("http://example.com/x".to_string()),
        );
        map.insert(
            "DATE".to_string(),
            serde_json::Value::String("20240115".to_string()),
        );
        let raw = RawRecord::Map(map);
        let key = DedupStrategy::UrlDate.key_for(&raw).unwrap();
        assert!(key.as_str().starts_with("http://example.com/x"));
    }

    #[test]
    fn records_without_identity_yield_no_key() {
        let raw = RawRecord::Map(serde_json::Map::new());
        assert!(DedupStrategy::UrlOnly.key_for(&raw).is_none());
    }
}
