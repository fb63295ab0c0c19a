//! The TV GKG record: the GKG grammar over closed-caption transcripts, with
//! only a subset of columns populated, plus a char-offset-to-timecode table
//! hidden in the extras blob.

use super::gkg::Gkg;
use crate::raw::RawRecord;
use crate::RecordError;
use serde::{Deserialize, Serialize};

const SPECIAL: &str = "<SPECIAL>";
const TIMECODE_TOC: &str = "CHARTIMECODEOFFSETTOC:";

/// Maps a character offset in the transcript to the broadcast timecode at
/// which that character was spoken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimecodeOffset {
    pub char_offset: u64,
    pub timecode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvGkg {
    pub gkg: Gkg,
    pub timecodes: Vec<TimecodeOffset>,
}

/// Scans `<SPECIAL>`-delimited blocks in the extras blob for the timecode
/// table and decodes its `offset:timecode` pairs.
fn parse_timecodes(extras: &str) -> Vec<TimecodeOffset> {
    let Some(block) = extras
        .split(SPECIAL)
        .find_map(|block| block.trim().strip_prefix(TIMECODE_TOC))
    else {
        return Vec::new();
    };
    block
        .split(';')
        .filter_map(|pair| {
            let (offset, timecode) = pair.split_once(':')?;
            Some(TimecodeOffset {
                char_offset: offset.trim().parse().ok()?,
                timecode: timecode.trim().to_string(),
            })
        })
        .collect()
}

impl TvGkg {
    pub fn from_raw(raw: &RawRecord) -> Result<TvGkg, RecordError> {
        let gkg = Gkg::from_raw(raw)?;
        let timecodes = gkg
            .extras_xml
            .as_deref()
            .map(parse_timecodes)
            .unwrap_or_default();
        Ok(TvGkg { gkg, timecodes })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn timecode_toc_is_decoded() {
        let extras = "<SPECIAL>CHARTIMECODEOFFSETTOC:0:20240115001500;532:20240115001530;1090:20240115001600<SPECIAL>";
        let toc = parse_timecodes(extras);
        assert_eq!(toc.len(), 3);
        assert_eq!(toc[1].char_offset, 532);
        assert_eq!(toc[1].timecode, "20240115001530");
    }

    #[test]
    fn missing_toc_yields_empty() {
        assert!(parse_timecodes("<SPECIAL>OTHERBLOCK:x<SPECIAL>").is_empty());
        assert!(parse_timecodes("no sentinels at all").is_empty());
    }
}
