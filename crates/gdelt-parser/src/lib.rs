//! Decoders from raw slot-file bytes to [`RawRecord`]s.
//!
//! Every parser shares the same lenient posture: a malformed line is logged
//! at WARN and skipped, empty cells stay empty (the validated-record layer
//! maps them to absent), and invalid UTF-8 is replaced rather than fatal.
//! Parsers never perform I/O; they consume a fully extracted artifact and
//! yield records lazily.

pub mod extras;

mod drift;
mod jsonl;
mod tab;

use bytes::Bytes;
use gdelt_model::{RawRecord, RecordType};

/// A lazily-decoded sequence of raw records backed by one artifact.
pub type RawIter = Box<dyn Iterator<Item = RawRecord> + Send>;

/// Decodes one artifact's bytes into raw records for `record_type`.
///
/// The returned iterator owns the (replacement-decoded) text of the artifact
/// and releases it when dropped.
pub fn parse(record_type: RecordType, bytes: Bytes) -> RawIter {
    match record_type {
        RecordType::Events => tab::rows(bytes, tab::Columns::EventsAuto),
        RecordType::Mentions => tab::rows(bytes, tab::Columns::Fixed(16)),
        RecordType::Gkg | RecordType::TvGkg => tab::rows(bytes, tab::Columns::Fixed(27)),
        RecordType::Vgkg => tab::rows(bytes, tab::Columns::Fixed(12)),
        RecordType::FrontpageGraph => tab::rows(bytes, tab::Columns::Fixed(5)),
        RecordType::BroadcastNgrams => tab::rows(bytes, tab::Columns::Broadcast),
        RecordType::WebNgrams => jsonl::maps(bytes, None),
        RecordType::QuoteGraph
        | RecordType::EntityGraph
        | RecordType::GeoGraph
        | RecordType::EmbeddedMetadataGraph
        | RecordType::ArticleListGraph => jsonl::maps(bytes, Some(record_type)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use gdelt_model::records::Event;

    #[test]
    fn events_end_to_end() {
        let mut row: Vec<String> = vec![String::new(); 61];
        row[0] = "1".to_string();
        row[26] = "010".to_string();
        let content = format!("{}\n", row.join("\t"));

        let records: Vec<RawRecord> =
            parse(RecordType::Events, Bytes::from(content.into_bytes())).collect();
        assert_eq!(records.len(), 1);
        let event = Event::from_raw(&records[0]).unwrap();
        assert_eq!(event.event_code.as_deref(), Some("010"));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let mut row: Vec<Vec<u8>> = vec![Vec::new(); 16];
        row[0] = b"42".to_vec();
        row[4] = vec![b'b', 0xff, b'c'];
        let content = row.join(&b'\t');

        let records: Vec<RawRecord> =
            parse(RecordType::Mentions, Bytes::from(content)).collect();
        assert_eq!(records.len(), 1);
        let raw = records[0].as_row().unwrap();
        assert_eq!(raw.get(4), Some("b\u{fffd}c"));
    }
}
