//! TAB-delimited row framing, shared by every tabular record type.
//!
//! GDELT's tabular files use `.CSV` extensions but are TAB-separated with no
//! quoting; a quote character inside a cell is literal text. The reader is
//! configured accordingly.

use bytes::Bytes;
use gdelt_model::{FormatVersion, RawRecord, TabRow};
use std::io::Cursor;

/// Column expectations per tabular record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Columns {
    /// Events: 57 (v1) or 61 (v2), inferred from the first usable row and
    /// fixed for the remainder of the file.
    EventsAuto,
    Fixed(usize),
    /// Broadcast n-grams: 5 (TV) or 6 (radio, trailing show column).
    Broadcast,
}

pub(crate) fn rows(bytes: Bytes, columns: Columns) -> super::RawIter {
    // Decode up front with replacement so that a stray invalid byte cannot
    // abort the scan. Artifacts live only for the span of one extraction, so
    // this is the single text allocation for the file.
    let text = match String::from_utf8(Vec::from(bytes.as_ref())) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    };
    let reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(Cursor::new(text.into_bytes()));
    Box::new(TabRows {
        records: reader.into_records(),
        columns,
        version: None,
        line: 0,
    })
}

struct TabRows {
    records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
    columns: Columns,
    version: Option<FormatVersion>,
    line: u64,
}

impl TabRows {
    /// Returns the accepted version for a row of `len` columns, or `None`
    /// when the row is malformed for this file's format.
    fn accept(&mut self, len: usize) -> Option<FormatVersion> {
        match self.columns {
            Columns::Fixed(expected) => (len == expected).then_some(FormatVersion::V2),
            Columns::Broadcast => (len == 5 || len == 6).then_some(FormatVersion::V2),
            Columns::EventsAuto => match self.version {
                Some(FormatVersion::V1) => (len == 57).then_some(FormatVersion::V1),
                Some(FormatVersion::V2) => (len == 61).then_some(FormatVersion::V2),
                None => {
                    let inferred = match len {
                        57 => FormatVersion::V1,
                        61 => FormatVersion::V2,
                        _ => return None,
                    };
                    self.version = Some(inferred);
                    tracing::debug!(columns = len, version = ?inferred, "inferred events format");
                    Some(inferred)
                }
            },
        }
    }
}

impl Iterator for TabRows {
    type Item = RawRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(err) => {
                    tracing::warn!(line = self.line, error = %err, "skipping malformed row");
                    self.line += 1;
                    continue;
                }
            };
            self.line += 1;

            // The reader surfaces blank lines as a single empty field.
            if record.len() <= 1 && record.get(0).map_or(true, str::is_empty) {
                continue;
            }

            let Some(version) = self.accept(record.len()) else {
                tracing::warn!(
                    line = self.line,
                    columns = record.len(),
                    "skipping row with unexpected column count"
                );
                continue;
            };
            let fields = record.iter().map(|f| f.to_string()).collect();
            return Some(RawRecord::Row(TabRow::new(fields, version)));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn collect(content: &str, columns: Columns) -> Vec<TabRow> {
        rows(Bytes::from(content.to_string().into_bytes()), columns)
            .filter_map(|raw| match raw {
                RawRecord::Row(row) => Some(row),
                RawRecord::Map(_) => None,
            })
            .collect()
    }

    fn line(cells: usize) -> String {
        vec!["x"; cells].join("\t")
    }

    #[test]
    fn version_is_inferred_once_and_fixed() {
        let content = format!("{}\n{}\n{}\n", line(57), line(61), line(57));
        let rows = collect(&content, Columns::EventsAuto);
        // The 61-column row is malformed relative to the inferred v1 format.
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.version == FormatVersion::V1));
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let content = format!("{}\n{}\n\n{}\n", line(27), line(3), line(27));
        let rows = collect(&content, Columns::Fixed(27));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn broadcast_accepts_five_or_six_columns() {
        let content = format!("{}\n{}\n{}\n", line(5), line(6), line(4));
        let rows = collect(&content, Columns::Broadcast);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn quotes_are_literal_text() {
        let content = "a\t\"b\tc";
        let rows = collect(content, Columns::Fixed(3));
        assert_eq!(rows[0].get(1), Some("\"b"));
    }
}
