//! The Visual GKG record: 12 TAB columns whose cells use two levels of
//! nested delimiters, `<RECORD>` between repeating entries and `<FIELD>`
//! between the positional sub-fields of one entry.
//!
//! Sub-structures stay as lightweight untyped mappings: a VGKG slot holds
//! annotations for tens of thousands of images, and full typed models for
//! every vision annotation would dominate the cost of a scan.

use super::opt_int;
use crate::raw::{RawRecord, TabRow};
use crate::RecordError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub(crate) const COLUMNS: usize = 12;

const RECORD_SEP: &str = "<RECORD>";
const FIELD_SEP: &str = "<FIELD>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vgkg {
    /// YYYYMMDDHHMMSS.
    pub date: Option<i64>,
    pub document_identifier: Option<String>,
    pub image_url: Option<String>,
    /// `{label, confidence, mid}` per entry.
    pub labels: Vec<Map<String, Value>>,
    /// `{entity, confidence, mid}` per entry.
    pub web_entities: Vec<Map<String, Value>>,
    /// `{name, confidence, lat, lon}` per entry.
    pub geo_landmarks: Vec<Map<String, Value>>,
    /// `{logo, confidence, mid}` per entry.
    pub logos: Vec<Map<String, Value>>,
    /// Likelihood codes -1..4 for `{adult, spoof, medical, violence, racy}`.
    pub safe_search: Option<Map<String, Value>>,
    /// `{confidence, roll, pan, tilt}` per detected face: pose angles, not
    /// emotion scores.
    pub faces: Vec<Map<String, Value>>,
    pub ocr: Option<String>,
    pub lang_hints: Vec<String>,
    pub raw_json: Option<String>,
}

fn records(cell: Option<&str>) -> impl Iterator<Item = Vec<&str>> + '_ {
    cell.unwrap_or("")
        .split(RECORD_SEP)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|rec| rec.split(FIELD_SEP).collect())
}

fn string_field(fields: &[&str], idx: usize) -> Value {
    match fields.get(idx) {
        Some(s) if !s.is_empty() => Value::String(s.to_string()),
        _ => Value::Null,
    }
}

fn float_field(fields: &[&str], idx: usize) -> Value {
    fields
        .get(idx)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn entity_maps(cell: Option<&str>, name_key: &str) -> Vec<Map<String, Value>> {
    records(cell)
        .map(|fields| {
            let mut map = Map::new();
            map.insert(name_key.to_string(), string_field(&fields, 0));
            map.insert("confidence".to_string(), float_field(&fields, 1));
            map.insert("mid".to_string(), string_field(&fields, 2));
            map
        })
        .collect()
}

fn landmark_maps(cell: Option<&str>) -> Vec<Map<String, Value>> {
    records(cell)
        .map(|fields| {
            let mut map = Map::new();
            map.insert("name".to_string(), string_field(&fields, 0));
            map.insert("confidence".to_string(), float_field(&fields, 1));
            map.insert("lat".to_string(), float_field(&fields, 2));
            map.insert("lon".to_string(), float_field(&fields, 3));
            map
        })
        .collect()
}

/// Safesearch likelihoods are small integers (-1 unknown, 0..4 increasing
/// likelihood), deliberately not floats.
fn safe_search_map(cell: Option<&str>) -> Option<Map<String, Value>> {
    let fields: Vec<&str> = records(cell).next()?;
    let likelihood = |idx: usize| -> Value {
        fields
            .get(idx)
            .and_then(|v| v.trim().parse::<i8>().ok())
            .filter(|v| (-1..=4).contains(v))
            .map(|v| Value::Number(v.into()))
            .unwrap_or(Value::Null)
    };
    let mut map = Map::new();
    for (idx, key) in ["adult", "spoof", "medical", "violence", "racy"]
        .iter()
        .enumerate()
    {
        map.insert(key.to_string(), likelihood(idx));
    }
    Some(map)
}

fn face_maps(cell: Option<&str>) -> Vec<Map<String, Value>> {
    records(cell)
        .map(|fields| {
            let mut map = Map::new();
            map.insert("confidence".to_string(), float_field(&fields, 0));
            map.insert("roll".to_string(), float_field(&fields, 1));
            map.insert("pan".to_string(), float_field(&fields, 2));
            map.insert("tilt".to_string(), float_field(&fields, 3));
            map
        })
        .collect()
}

impl Vgkg {
    pub fn from_raw(raw: &RawRecord) -> Result<Vgkg, RecordError> {
        let row = match raw {
            RawRecord::Row(row) => row,
            RawRecord::Map(_) => return Err(RecordError::WrongShape("TAB row")),
        };
        Self::from_row(row)
    }

    fn from_row(row: &TabRow) -> Result<Vgkg, RecordError> {
        if row.fields.len() != COLUMNS {
            return Err(RecordError::ColumnCount {
                expected: COLUMNS,
                actual: row.fields.len(),
            });
        }
        Ok(Vgkg {
            date: opt_int(row.get(0), 0, "DATE")?,
            document_identifier: row.get_owned(1),
            image_url: row.get_owned(2),
            labels: entity_maps(row.get(3), "label"),
            web_entities: entity_maps(row.get(4), "entity"),
            geo_landmarks: landmark_maps(row.get(5)),
            logos: entity_maps(row.get(6), "logo"),
            safe_search: safe_search_map(row.get(7)),
            faces: face_maps(row.get(8)),
            ocr: row.get_owned(9),
            lang_hints: row
                .get(10)
                .map(|cell| {
                    cell.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string())
                        .collect()
                })
                .unwrap_or_default(),
            raw_json: row.get_owned(11),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::raw::FormatVersion;

    #[test]
    fn nested_field_record_delimiters() {
        let mut fields = vec![String::new(); COLUMNS];
        fields[0] = "20240115001500".to_string();
        fields[1] = "https://example.com/story".to_string();
        fields[2] = "https://example.com/image.jpg".to_string();
        fields[3] = "protest<FIELD>0.94<FIELD>/m/01fc2l<RECORD>crowd<FIELD>0.89<FIELD>/m/03qtwd".to_string();
        fields[7] = "1<FIELD>0<FIELD>-1<FIELD>3<FIELD>2".to_string();
        fields[8] = "0.99<FIELD>1.5<FIELD>-12.0<FIELD>3.25".to_string();

        let row = TabRow::new(fields, FormatVersion::V2);
        let vgkg = Vgkg::from_raw(&RawRecord::Row(row)).unwrap();

        assert_eq!(vgkg.labels.len(), 2);
        assert_eq!(vgkg.labels[0]["label"], "protest");
        assert_eq!(vgkg.labels[1]["confidence"], 0.89);

        let safe = vgkg.safe_search.unwrap();
        assert_eq!(safe["adult"], 1);
        assert_eq!(safe["medical"], -1);
        assert_eq!(safe["violence"], 3);

        assert_eq!(vgkg.faces[0]["pan"], -12.0);
        assert_eq!(vgkg.faces[0]["tilt"], 3.25);
    }

    #[test]
    fn safesearch_out_of_range_is_null() {
        let mut fields = vec![String::new(); COLUMNS];
        fields[7] = "9<FIELD>0<FIELD>0<FIELD>0<FIELD>0".to_string();
        let row = TabRow::new(fields, FormatVersion::V2);
        let vgkg = Vgkg::from_raw(&RawRecord::Row(row)).unwrap();
        assert_eq!(vgkg.safe_search.unwrap()["adult"], Value::Null);
    }
}
