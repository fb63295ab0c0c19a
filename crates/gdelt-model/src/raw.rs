use serde_json::{Map, Value};

/// File-format generation of a TAB-delimited row, inferred once per file from
/// the column count of the first non-blank row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    V1,
    V2,
}

/// One TAB-delimited row, split but not yet converted. Empty cells are kept
/// as empty strings here; the empty-means-absent rule is applied by the
/// validated-record constructors so that raw rows stay cheap to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct TabRow {
    pub fields: Vec<String>,
    pub version: FormatVersion,
}

impl TabRow {
    pub fn new(fields: Vec<String>, version: FormatVersion) -> Self {
        TabRow { fields, version }
    }

    /// Returns the cell at `idx`, with empty mapped to `None`.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(|s| s.as_str()).filter(|s| !s.is_empty())
    }

    /// Returns the cell at `idx` as an owned string, empty mapped to `None`.
    pub fn get_owned(&self, idx: usize) -> Option<String> {
        self.get(idx).map(|s| s.to_string())
    }
}

/// The intermediate parse product shared by every source. TAB-delimited file
/// formats produce `Row`; JSON-lines formats and warehouse result sets
/// produce `Map` keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Row(TabRow),
    Map(Map<String, Value>),
}

impl RawRecord {
    pub fn as_row(&self) -> Option<&TabRow> {
        match self {
            RawRecord::Row(row) => Some(row),
            RawRecord::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map<String, Value>> {
        match self {
            RawRecord::Map(map) => Some(map),
            RawRecord::Row(_) => None,
        }
    }

    /// Looks up a string-ish value by column name in a mapping record.
    /// Numeric cells are rendered to their string form, which keeps the
    /// warehouse branch aligned with the file branch where everything starts
    /// as text.
    pub fn map_str(&self, key: &str) -> Option<String> {
        let map = self.as_map()?;
        match map.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}
