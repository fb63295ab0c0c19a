//! The Mentions table record: one observed article reporting one event.
//! 16 TAB columns, a single format generation.

use super::{map_f64, map_i64, map_string, opt_float, opt_int};
use crate::raw::{RawRecord, TabRow};
use crate::RecordError;
use serde::{Deserialize, Serialize};

const COLUMNS: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub global_event_id: i64,
    /// YYYYMMDDHHMMSS of the event the mention refers to.
    pub event_time_date: Option<i64>,
    /// YYYYMMDDHHMMSS of the mentioning document.
    pub mention_time_date: Option<i64>,
    /// 1 web, 2 citation-only, 3 core, 4 DTIC, 5 JSTOR, 6 non-textual.
    pub mention_type: Option<u8>,
    pub mention_source_name: Option<String>,
    /// URL or citation of the mentioning document.
    pub mention_identifier: Option<String>,
    pub sentence_id: Option<i32>,
    pub actor1_char_offset: Option<i64>,
    pub actor2_char_offset: Option<i64>,
    pub action_char_offset: Option<i64>,
    pub in_raw_text: Option<bool>,
    /// Percent confidence (10..100) that the event was correctly extracted.
    pub confidence: Option<u8>,
    pub mention_doc_len: Option<i64>,
    pub mention_doc_tone: Option<f64>,
    pub mention_doc_translation_info: Option<String>,
    pub extras: Option<String>,
}

impl Mention {
    pub fn from_raw(raw: &RawRecord) -> Result<Mention, RecordError> {
        match raw {
            RawRecord::Row(row) => Self::from_row(row),
            RawRecord::Map(map) => Self::from_map(map),
        }
    }

    fn from_row(row: &TabRow) -> Result<Mention, RecordError> {
        if row.fields.len() != COLUMNS {
            return Err(RecordError::ColumnCount {
                expected: COLUMNS,
                actual: row.fields.len(),
            });
        }
        let global_event_id = opt_int(row.get(0), 0, "GlobalEventID")?
            .ok_or(RecordError::MissingField("GlobalEventID"))?;
        Ok(Mention {
            global_event_id,
            event_time_date: opt_int(row.get(1), 1, "EventTimeDate")?,
            mention_time_date: opt_int(row.get(2), 2, "MentionTimeDate")?,
            mention_type: opt_int(row.get(3), 3, "MentionType")?,
            mention_source_name: row.get_owned(4),
            mention_identifier: row.get_owned(5),
            sentence_id: opt_int(row.get(6), 6, "SentenceID")?,
            actor1_char_offset: non_negative(opt_int(row.get(7), 7, "Actor1CharOffset")?),
            actor2_char_offset: non_negative(opt_int(row.get(8), 8, "Actor2CharOffset")?),
            action_char_offset: non_negative(opt_int(row.get(9), 9, "ActionCharOffset")?),
            in_raw_text: row.get(10).map(|v| v == "1"),
            confidence: opt_int(row.get(11), 11, "Confidence")?,
            mention_doc_len: opt_int(row.get(12), 12, "MentionDocLen")?,
            mention_doc_tone: opt_float(row.get(13), 13, "MentionDocTone")?,
            mention_doc_translation_info: row.get_owned(14),
            extras: row.get_owned(15),
        })
    }

    fn from_map(map: &serde_json::Map<String, serde_json::Value>) -> Result<Mention, RecordError> {
        let global_event_id =
            map_i64(map, "GLOBALEVENTID")?.ok_or(RecordError::MissingField("GLOBALEVENTID"))?;
        Ok(Mention {
            global_event_id,
            event_time_date: map_i64(map, "EventTimeDate")?,
            mention_time_date: map_i64(map, "MentionTimeDate")?,
            mention_type: map_i64(map, "MentionType")?.map(|v| v as u8),
            mention_source_name: map_string(map, "MentionSourceName"),
            mention_identifier: map_string(map, "MentionIdentifier"),
            sentence_id: map_i64(map, "SentenceID")?.map(|v| v as i32),
            actor1_char_offset: non_negative(map_i64(map, "Actor1CharOffset")?),
            actor2_char_offset: non_negative(map_i64(map, "Actor2CharOffset")?),
            action_char_offset: non_negative(map_i64(map, "ActionCharOffset")?),
            in_raw_text: map_i64(map, "InRawText")?.map(|v| v == 1),
            confidence: map_i64(map, "Confidence")?.map(|v| v as u8),
            mention_doc_len: map_i64(map, "MentionDocLen")?,
            mention_doc_tone: map_f64(map, "MentionDocTone")?,
            mention_doc_translation_info: map_string(map, "MentionDocTranslationInfo"),
            extras: map_string(map, "Extras"),
        })
    }
}

/// Character offsets use -1 for "not found"; normalize that to absent.
fn non_negative(offset: Option<i64>) -> Option<i64> {
    offset.filter(|v| *v >= 0)
}
