//! JSON-lines framing for the web n-grams feed and the five JSON graph
//! datasets.
//!
//! Each line is decoded independently so that one malformed line cannot
//! poison the rest of the artifact. Graph datasets additionally run the
//! schema-drift filter: keys outside the model's known-field list are warned
//! about once and dropped.

use crate::drift;
use bytes::Bytes;
use gdelt_model::records::known_fields;
use gdelt_model::{RawRecord, RecordType};
use serde_json::{Map, Value};

pub(crate) fn maps(bytes: Bytes, drift_model: Option<RecordType>) -> super::RawIter {
    let text = match String::from_utf8(Vec::from(bytes.as_ref())) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    };
    Box::new(JsonLines {
        text,
        pos: 0,
        line: 0,
        drift_model,
    })
}

struct JsonLines {
    text: String,
    pos: usize,
    line: u64,
    drift_model: Option<RecordType>,
}

impl Iterator for JsonLines {
    type Item = RawRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            let rest = &self.text[self.pos..];
            let (line, consumed) = match rest.find('\n') {
                Some(idx) => (&rest[..idx], idx + 1),
                None => (rest, rest.len()),
            };
            self.pos += consumed;
            self.line += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut map: Map<String, Value> = match serde_json::from_str(line) {
                Ok(map) => map,
                Err(err) => {
                    tracing::warn!(line = self.line, error = %err, "skipping malformed JSON line");
                    continue;
                }
            };
            if let Some(record_type) = self.drift_model {
                filter_drift(record_type, &mut map);
            }
            return Some(RawRecord::Map(map));
        }
        None
    }
}

fn filter_drift(record_type: RecordType, map: &mut Map<String, Value>) {
    let known = known_fields(record_type);
    let unknown: Vec<String> = map
        .keys()
        .filter(|key| !known.contains(&key.as_str()))
        .cloned()
        .collect();
    for key in unknown {
        drift::warn_unknown_field(record_type, &key);
        map.remove(&key);
    }
}
