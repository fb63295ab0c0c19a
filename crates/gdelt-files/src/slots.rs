//! Slot timestamps and slot-file URL enumeration.
//!
//! Most record types publish a file every 15 minutes; the frontpage graph is
//! hourly and the TV GKG is daily with a 48-hour embargo. Broadcast n-grams
//! have no computable URL scheme at all and are enumerated from the master
//! index instead.

use chrono::{DateTime, Datelike, DurationRound, Timelike, Utc};
use gdelt_model::{DateRange, RecordType};

pub const DEFAULT_FILE_ENDPOINT: &str = "https://data.gdeltproject.org";

/// Base host for the file archive. `GDELT_FILE_ENDPOINT` overrides it, for
/// mirrors and test fixtures.
pub fn file_endpoint() -> String {
    std::env::var("GDELT_FILE_ENDPOINT")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_FILE_ENDPOINT.to_string())
}

fn v2_base() -> String {
    format!("{}/gdeltv2/", file_endpoint())
}

fn v3_base() -> String {
    format!("{}/gdeltv3/", file_endpoint())
}

pub fn master_index_url(translated: bool) -> String {
    if translated {
        format!("{}masterfilelist-translation.txt", v2_base())
    } else {
        format!("{}masterfilelist.txt", v2_base())
    }
}

pub fn last_update_url(translated: bool) -> String {
    if translated {
        format!("{}lastupdate-translation.txt", v2_base())
    } else {
        format!("{}lastupdate.txt", v2_base())
    }
}

/// Hours before which a TV GKG daily file is not yet published.
const TV_GKG_EMBARGO_HOURS: i64 = 48;

/// A publication interval boundary, quantized to the record type's cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slot(DateTime<Utc>);

impl Slot {
    /// Quantizes `at` down to the cadence of `record_type`.
    pub fn quantize(at: DateTime<Utc>, record_type: RecordType) -> Slot {
        let cadence = cadence(record_type);
        // duration_trunc cannot fail for the cadences used here.
        Slot(at.duration_trunc(cadence).unwrap_or(at))
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.0
    }

    /// `YYYYMMDDHHMMSS`, the form embedded in slot URLs.
    pub fn timestamp(&self) -> String {
        format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day(),
            self.0.hour(),
            self.0.minute(),
            self.0.second()
        )
    }

    /// `YYYYMMDD`, used by the daily TV GKG files.
    pub fn date_stamp(&self) -> String {
        format!(
            "{:04}{:02}{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

/// Publication cadence per record type.
pub fn cadence(record_type: RecordType) -> chrono::Duration {
    match record_type {
        RecordType::FrontpageGraph => chrono::Duration::hours(1),
        RecordType::TvGkg => chrono::Duration::days(1),
        // VGKG publishes every 60 seconds, but enumeration folds it to the
        // 15-minute grid; the master index covers the rest.
        _ => chrono::Duration::minutes(15),
    }
}

/// Builds the slot-file URL for one slot, or `None` for inventory-driven
/// record types without a computable scheme.
pub fn slot_url(record_type: RecordType, slot: Slot, translated: bool) -> Option<String> {
    let infix = if translated { "translation." } else { "" };
    let ts = slot.timestamp();
    let v2 = v2_base();
    let v3 = v3_base();
    let url = match record_type {
        RecordType::Events => format!("{v2}{ts}.{infix}export.CSV.zip"),
        RecordType::Mentions => format!("{v2}{ts}.{infix}mentions.CSV.zip"),
        RecordType::Gkg => format!("{v2}{ts}.{infix}gkg.csv.zip"),
        RecordType::WebNgrams => format!("{v3}webngrams/{ts}.webngrams.json.gz"),
        RecordType::Vgkg => format!("{v3}vgkg/{ts}.vgkg.v3.csv.gz"),
        RecordType::TvGkg => format!("{v2}iatv/{}.gkg.csv.gz", slot.date_stamp()),
        RecordType::QuoteGraph => format!("{v3}gqg/{ts}.gqg.json.gz"),
        RecordType::EntityGraph => format!("{v3}geg/{ts}.geg.json.gz"),
        RecordType::FrontpageGraph => format!("{v3}gfg/{ts}.gfg.csv.gz"),
        RecordType::GeoGraph => format!("{v3}ggg/{ts}.ggg.json.gz"),
        RecordType::EmbeddedMetadataGraph => format!("{v3}gemg/{ts}.gemg.json.gz"),
        RecordType::ArticleListGraph => format!("{v3}gal/{ts}.gal.json.gz"),
        RecordType::BroadcastNgrams => return None,
    };
    Some(url)
}

/// Enumerates every slot URL for `range`, in chronological order. The URLs
/// produced here are candidates: some slots are routinely absent upstream
/// and surface as 404s, which the download path treats as non-errors.
pub fn enumerate(
    record_type: RecordType,
    range: &DateRange,
    translated: bool,
) -> impl Iterator<Item = (Slot, String)> + Send {
    let step = cadence(record_type);
    let embargo_cutoff = (record_type == RecordType::TvGkg)
        .then(|| Utc::now() - chrono::Duration::hours(TV_GKG_EMBARGO_HOURS));
    let mut next = Slot::quantize(range.start, record_type);
    let end = range.end;

    std::iter::from_fn(move || loop {
        if next.time() >= end {
            return None;
        }
        let slot = next;
        next = Slot(slot.time() + step);

        if let Some(cutoff) = embargo_cutoff {
            if slot.time() > cutoff {
                tracing::debug!(slot = %slot.timestamp(), "slot still under publication embargo");
                continue;
            }
        }
        match slot_url(record_type, slot, translated) {
            Some(url) => return Some((slot, url)),
            None => return None,
        }
    })
}

/// One row of the master file index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub size: u64,
    pub md5: String,
    pub url: String,
}

/// Parses `masterfilelist.txt`: one `size md5 url` triple per line.
/// Malformed lines are skipped.
pub fn parse_master_index(text: &str) -> Vec<IndexEntry> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let size = parts.next()?.parse().ok()?;
            let md5 = parts.next()?.to_string();
            let url = parts.next()?.to_string();
            Some(IndexEntry { size, md5, url })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn range(start: (u32, u32), end: (u32, u32)) -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2024, 1, 15, start.0, start.1, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, end.0, end.1, 0).unwrap(),
        )
    }

    #[test]
    fn fifteen_minute_enumeration() {
        let urls: Vec<String> = enumerate(RecordType::Events, &range((0, 0), (1, 0)), false)
            .map(|(_, url)| url)
            .collect();
        assert_eq!(urls.len(), 4);
        assert_eq!(
            urls[0],
            "https://data.gdeltproject.org/gdeltv2/20240115000000.export.CSV.zip"
        );
        assert_eq!(
            urls[3],
            "https://data.gdeltproject.org/gdeltv2/20240115004500.export.CSV.zip"
        );
    }

    #[test]
    fn translation_variant_gets_the_infix() {
        let (_, url) = enumerate(RecordType::Gkg, &range((0, 0), (0, 15)), true)
            .next()
            .unwrap();
        assert_eq!(
            url,
            "https://data.gdeltproject.org/gdeltv2/20240115000000.translation.gkg.csv.zip"
        );
    }

    #[test]
    fn quantization_snaps_to_the_grid() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 0, 22, 31).unwrap();
        let slot = Slot::quantize(at, RecordType::Events);
        assert_eq!(slot.timestamp(), "20240115001500");

        let hourly = Slot::quantize(at, RecordType::FrontpageGraph);
        assert_eq!(hourly.timestamp(), "20240115000000");
    }

    #[test]
    fn frontpage_graph_is_hourly() {
        let urls: Vec<String> =
            enumerate(RecordType::FrontpageGraph, &range((0, 0), (3, 0)), false)
                .map(|(_, url)| url)
                .collect();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].ends_with("20240115000000.gfg.csv.gz"));
    }

    #[test]
    fn broadcast_ngrams_have_no_computed_urls() {
        let mut iter = enumerate(RecordType::BroadcastNgrams, &range((0, 0), (1, 0)), false);
        assert!(iter.next().is_none());
    }

    #[test]
    fn master_index_parses_and_skips_garbage() {
        let text = "\
125832 8b1f0a2c9e6d1b3f http://data.gdeltproject.org/gdeltv2/20240115000000.export.CSV.zip
not-a-size x y
98213 aa12bc34 http://data.gdeltproject.org/gdeltv2/20240115000000.mentions.CSV.zip";
        let entries = parse_master_index(text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].size, 98213);
    }
}
