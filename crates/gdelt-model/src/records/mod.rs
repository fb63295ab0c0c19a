//! Validated record types, one per GDELT record shape.
//!
//! Each type owns a `from_raw` constructor that promotes a [`RawRecord`]
//! into the typed shape, applying the conversion rules that raw parsing
//! deliberately defers: empty-means-absent, lazy numeric conversion, and
//! leading-zero-preserving CAMEO codes.
//!
//! [`RawRecord`]: crate::RawRecord

mod api;
mod events;
mod gkg;
mod graph;
mod mentions;
mod ngrams;
mod tvgkg;
mod vgkg;

pub use api::{Article, ContextResult, GeoPoint, TimelinePoint};
pub use events::{Actor, Event, EventGeo};
pub use gkg::{
    Amount, Count, EnhancedDate, EnhancedEntity, EnhancedLocation, EnhancedTheme, GcamScore, Gkg,
    GkgVersion, Location, Quotation, Tone, TranslationInfo,
};
pub use graph::{known_fields, FrontpageLink, GraphRecord};
pub use mentions::Mention;
pub use ngrams::{BroadcastNgram, BroadcastSource, WebNgram};
pub use tvgkg::{TimecodeOffset, TvGkg};
pub use vgkg::Vgkg;

use crate::RecordError;
use serde_json::Value;

/// Parses an optional integer out of a TAB cell. Empty is absent, anything
/// else must parse.
pub(crate) fn opt_int<T: std::str::FromStr>(
    cell: Option<&str>,
    column: usize,
    name: &'static str,
) -> Result<Option<T>, RecordError> {
    match cell {
        None => Ok(None),
        Some(text) => text.trim().parse::<T>().map(Some).map_err(|_| {
            RecordError::InvalidInt {
                column,
                name,
                value: text.to_string(),
            }
        }),
    }
}

pub(crate) fn opt_float(
    cell: Option<&str>,
    column: usize,
    name: &'static str,
) -> Result<Option<f64>, RecordError> {
    match cell {
        None => Ok(None),
        Some(text) => text.trim().parse::<f64>().map(Some).map_err(|_| {
            RecordError::InvalidFloat {
                column,
                name,
                value: text.to_string(),
            }
        }),
    }
}

/// Reads a string field from a JSON mapping, treating empty string and null
/// as absent.
pub(crate) fn map_string(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn map_i64(
    map: &serde_json::Map<String, Value>,
    key: &'static str,
) -> Result<Option<i64>, RecordError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or(RecordError::FieldType {
            field: key,
            expected: "integer",
            value: n.to_string(),
        }),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| RecordError::FieldType {
            field: key,
            expected: "integer",
            value: s.clone(),
        }),
        Some(other) => Err(RecordError::FieldType {
            field: key,
            expected: "integer",
            value: other.to_string(),
        }),
    }
}

pub(crate) fn map_f64(
    map: &serde_json::Map<String, Value>,
    key: &'static str,
) -> Result<Option<f64>, RecordError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| RecordError::FieldType {
            field: key,
            expected: "float",
            value: s.clone(),
        }),
        Some(other) => Err(RecordError::FieldType {
            field: key,
            expected: "float",
            value: other.to_string(),
        }),
    }
}
