//! The Global Knowledge Graph (v2.1) record: 27 TAB columns, several of which
//! hold nested structures with their own delimiters.
//!
//! Cell-level decoding lives here, on the raw-to-validated boundary: the line
//! parser only splits columns, and this module takes each cell apart.

use super::{map_string, opt_int};
use crate::raw::{RawRecord, TabRow};
use crate::RecordError;
use serde::{Deserialize, Serialize};

pub(crate) const COLUMNS: usize = 27;

/// Which generation of fields a record actually populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GkgVersion {
    V1,
    V2,
}

/// A geocoded location, shared by the location and count columns.
/// V1 records carry seven `#`-separated fields; V2 adds ADM2 and a character
/// offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub geo_type: Option<u8>,
    pub full_name: Option<String>,
    pub country_code: Option<String>,
    pub adm1_code: Option<String>,
    pub adm2_code: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub feature_id: Option<String>,
}

/// V2 location: a [`Location`] plus the character offset it was found at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedLocation {
    pub location: Location,
    pub char_offset: Option<u64>,
}

/// An event-count claim ("10 protesters", "3 killed").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Count {
    pub count_type: String,
    pub count: Option<u64>,
    pub object_type: Option<String>,
    pub location: Option<Location>,
    /// Only populated by the V2.1 counts column.
    pub char_offset: Option<u64>,
}

/// A theme with its character offset (V2 enhanced themes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedTheme {
    pub theme: String,
    pub char_offset: Option<u64>,
}

/// A person or organization with its character offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedEntity {
    pub name: String,
    pub char_offset: Option<u64>,
}

/// The V1.5 tone block: six comma-separated floats plus a word count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    pub tone: Option<f64>,
    pub positive_score: Option<f64>,
    pub negative_score: Option<f64>,
    pub polarity: Option<f64>,
    pub activity_reference_density: Option<f64>,
    pub self_group_reference_density: Option<f64>,
    pub word_count: Option<u64>,
}

/// A date mentioned in the article text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedDate {
    /// 1 month only, 2 month+day, 3 year only, 4 full date.
    pub resolution: Option<u8>,
    pub month: Option<u8>,
    pub day: Option<u8>,
    pub year: Option<u16>,
    pub char_offset: Option<u64>,
}

/// One GCAM dimension score, `key:value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcamScore {
    pub key: String,
    pub value: f64,
}

/// A quotation: `offset#length#verb#quote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub char_offset: Option<u64>,
    pub length: Option<u64>,
    pub verb: Option<String>,
    pub quote: String,
}

/// An amount claim: `amount,object,offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub amount: Option<f64>,
    pub object: Option<String>,
    pub char_offset: Option<u64>,
}

/// Source language and engine for machine-translated records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationInfo {
    pub source_language: Option<String>,
    pub engine: Option<String>,
}

/// A validated GKG record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gkg {
    /// The full record id as published.
    pub record_id: String,
    /// The id with the translation marker stripped; equals `record_id` for
    /// untranslated records.
    pub original_id: String,
    /// True when the record id carries the `-T` translation marker.
    pub translated: bool,
    pub version: GkgVersion,
    /// YYYYMMDDHHMMSS.
    pub date: Option<i64>,
    pub source_collection_id: Option<u8>,
    pub source_common_name: Option<String>,
    pub document_identifier: Option<String>,
    pub counts: Vec<Count>,
    pub enhanced_counts: Vec<Count>,
    pub themes: Vec<String>,
    pub enhanced_themes: Vec<EnhancedTheme>,
    pub locations: Vec<Location>,
    pub enhanced_locations: Vec<EnhancedLocation>,
    pub persons: Vec<String>,
    pub enhanced_persons: Vec<EnhancedEntity>,
    pub organizations: Vec<String>,
    pub enhanced_organizations: Vec<EnhancedEntity>,
    pub tone: Option<Tone>,
    pub enhanced_dates: Vec<EnhancedDate>,
    pub gcam: Vec<GcamScore>,
    pub sharing_image: Option<String>,
    pub related_images: Vec<String>,
    pub social_image_embeds: Vec<String>,
    pub social_video_embeds: Vec<String>,
    pub quotations: Vec<Quotation>,
    pub all_names: Vec<EnhancedEntity>,
    pub amounts: Vec<Amount>,
    pub translation_info: Option<TranslationInfo>,
    pub extras_xml: Option<String>,
}

fn split_list(cell: Option<&str>) -> impl Iterator<Item = &str> + '_ {
    cell.unwrap_or("")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_location(fields: &[&str]) -> Location {
    let get = |i: usize| -> Option<String> {
        fields
            .get(i)
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
    };
    // 8 fields means the V2 layout with ADM2 at index 4.
    let v2 = fields.len() >= 8;
    let adm2 = usize::from(v2);
    Location {
        geo_type: get(0).and_then(|v| v.parse().ok()),
        full_name: get(1),
        country_code: get(2),
        adm1_code: get(3),
        adm2_code: if v2 { get(4) } else { None },
        lat: get(4 + adm2).and_then(|v| v.parse().ok()),
        lon: get(5 + adm2).and_then(|v| v.parse().ok()),
        feature_id: get(6 + adm2),
    }
}

fn parse_locations(cell: Option<&str>) -> Vec<Location> {
    split_list(cell)
        .map(|rec| parse_location(&rec.split('#').collect::<Vec<_>>()))
        .collect()
}

fn parse_enhanced_locations(cell: Option<&str>) -> Vec<EnhancedLocation> {
    // V2 locations append the character offset as the final `#` field.
    split_list(cell)
        .map(|rec| {
            let fields: Vec<&str> = rec.split('#').collect();
            let (loc_fields, offset) = if fields.len() > 8 {
                (&fields[..8], fields[8].parse().ok())
            } else {
                (&fields[..], None)
            };
            EnhancedLocation {
                location: parse_location(loc_fields),
                char_offset: offset,
            }
        })
        .collect()
}

fn parse_counts(cell: Option<&str>, with_offset: bool) -> Vec<Count> {
    split_list(cell)
        .filter_map(|rec| {
            let fields: Vec<&str> = rec.split('#').collect();
            let count_type = fields.first().copied().unwrap_or("");
            if count_type.is_empty() {
                return None;
            }
            // Layout: type#count#object#<location fields...>[#offset]
            let (loc_fields, offset) = if with_offset && fields.len() > 3 {
                (&fields[3..fields.len() - 1], fields[fields.len() - 1].parse().ok())
            } else if fields.len() > 3 {
                (&fields[3..], None)
            } else {
                (&fields[..0], None)
            };
            let location = parse_location(loc_fields);
            Some(Count {
                count_type: count_type.to_string(),
                count: fields.get(1).and_then(|v| v.parse().ok()),
                object_type: fields
                    .get(2)
                    .map(|s| s.to_string())
                    .filter(|s| !s.is_empty()),
                location: (location != Location::default()).then_some(location),
                char_offset: offset,
            })
        })
        .collect()
}

/// `name,offset` pairs separated by semicolons (themes, persons,
/// organizations, all-names).
fn parse_offset_pairs(cell: Option<&str>) -> Vec<EnhancedEntity> {
    split_list(cell)
        .filter_map(|rec| {
            let (name, offset) = match rec.rsplit_once(',') {
                Some((name, offset)) => (name, offset.parse().ok()),
                None => (rec, None),
            };
            if name.is_empty() {
                return None;
            }
            Some(EnhancedEntity {
                name: name.to_string(),
                char_offset: offset,
            })
        })
        .collect()
}

fn parse_tone(cell: Option<&str>) -> Option<Tone> {
    let cell = cell?;
    let fields: Vec<&str> = cell.split(',').collect();
    let f = |i: usize| fields.get(i).and_then(|v| v.trim().parse::<f64>().ok());
    Some(Tone {
        tone: f(0),
        positive_score: f(1),
        negative_score: f(2),
        polarity: f(3),
        activity_reference_density: f(4),
        self_group_reference_density: f(5),
        word_count: fields.get(6).and_then(|v| v.trim().parse().ok()),
    })
}

fn parse_enhanced_dates(cell: Option<&str>) -> Vec<EnhancedDate> {
    split_list(cell)
        .map(|rec| {
            let fields: Vec<&str> = rec.split('#').collect();
            let num = |i: usize| fields.get(i).and_then(|v| v.parse().ok());
            EnhancedDate {
                resolution: num(0),
                month: num(1),
                day: num(2),
                year: fields.get(3).and_then(|v| v.parse().ok()),
                char_offset: fields.get(4).and_then(|v| v.parse().ok()),
            }
        })
        .collect()
}

fn parse_gcam(cell: Option<&str>) -> Vec<GcamScore> {
    split_list(cell)
        .filter_map(|pair| {
            let (key, value) = pair.split_once(':')?;
            Some(GcamScore {
                key: key.to_string(),
                value: value.trim().parse().ok()?,
            })
        })
        .collect()
}

fn parse_quotations(cell: Option<&str>) -> Vec<Quotation> {
    cell.unwrap_or("")
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|rec| {
            let fields: Vec<&str> = rec.splitn(4, '#').collect();
            let quote = fields.get(3).copied().unwrap_or("");
            if quote.is_empty() && fields.len() < 4 {
                return None;
            }
            Some(Quotation {
                char_offset: fields.first().and_then(|v| v.parse().ok()),
                length: fields.get(1).and_then(|v| v.parse().ok()),
                verb: fields
                    .get(2)
                    .map(|s| s.to_string())
                    .filter(|s| !s.is_empty()),
                quote: quote.to_string(),
            })
        })
        .collect()
}

fn parse_amounts(cell: Option<&str>) -> Vec<Amount> {
    split_list(cell)
        .map(|rec| {
            let fields: Vec<&str> = rec.splitn(3, ',').collect();
            Amount {
                amount: fields.first().and_then(|v| v.parse().ok()),
                object: fields
                    .get(1)
                    .map(|s| s.to_string())
                    .filter(|s| !s.is_empty()),
                char_offset: fields.get(2).and_then(|v| v.parse().ok()),
            }
        })
        .collect()
}

fn parse_translation_info(cell: Option<&str>) -> Option<TranslationInfo> {
    let cell = cell?;
    let mut info = TranslationInfo::default();
    for part in cell.split(';') {
        match part.split_once(':') {
            Some(("srclc", lang)) => info.source_language = Some(lang.to_string()),
            Some(("eng", engine)) => info.engine = Some(engine.to_string()),
            _ => {}
        }
    }
    Some(info)
}

fn simple_list(cell: Option<&str>) -> Vec<String> {
    split_list(cell).map(|s| s.to_string()).collect()
}

/// Splits the translation marker out of a record id.
/// `20240115001500-T12` is the translated sibling of `20240115001500`.
fn split_record_id(id: &str) -> (String, bool) {
    match id.split_once("-T") {
        Some((prefix, seq)) if seq.bytes().all(|b| b.is_ascii_digit()) => {
            (prefix.to_string(), true)
        }
        _ => (id.to_string(), false),
    }
}

impl Gkg {
    pub fn from_raw(raw: &RawRecord) -> Result<Gkg, RecordError> {
        match raw {
            RawRecord::Row(row) => Self::from_row(row),
            RawRecord::Map(map) => Self::from_map(map),
        }
    }

    pub(crate) fn from_row(row: &TabRow) -> Result<Gkg, RecordError> {
        if row.fields.len() != COLUMNS {
            return Err(RecordError::ColumnCount {
                expected: COLUMNS,
                actual: row.fields.len(),
            });
        }
        let record_id = row
            .get_owned(0)
            .ok_or(RecordError::MissingField("GKGRECORDID"))?;
        let (original_id, translated) = split_record_id(&record_id);

        let enhanced_themes = parse_offset_pairs(row.get(8))
            .into_iter()
            .map(|e| EnhancedTheme {
                theme: e.name,
                char_offset: e.char_offset,
            })
            .collect::<Vec<_>>();
        let enhanced_locations = parse_enhanced_locations(row.get(10));
        let enhanced_persons = parse_offset_pairs(row.get(12));
        let enhanced_organizations = parse_offset_pairs(row.get(14));

        // Any populated enhanced column marks the record as v2.
        let version = if !enhanced_themes.is_empty()
            || !enhanced_locations.is_empty()
            || !enhanced_persons.is_empty()
            || !enhanced_organizations.is_empty()
            || row.get(6).is_some()
        {
            GkgVersion::V2
        } else {
            GkgVersion::V1
        };

        Ok(Gkg {
            original_id,
            translated,
            record_id,
            version,
            date: opt_int(row.get(1), 1, "DATE")?,
            source_collection_id: opt_int(row.get(2), 2, "SourceCollectionIdentifier")?,
            source_common_name: row.get_owned(3),
            document_identifier: row.get_owned(4),
            counts: parse_counts(row.get(5), false),
            enhanced_counts: parse_counts(row.get(6), true),
            themes: simple_list(row.get(7)),
            enhanced_themes,
            locations: parse_locations(row.get(9)),
            enhanced_locations,
            persons: simple_list(row.get(11)),
            enhanced_persons,
            organizations: simple_list(row.get(13)),
            enhanced_organizations,
            tone: parse_tone(row.get(15)),
            enhanced_dates: parse_enhanced_dates(row.get(16)),
            gcam: parse_gcam(row.get(17)),
            sharing_image: row.get_owned(18),
            related_images: simple_list(row.get(19)),
            social_image_embeds: simple_list(row.get(20)),
            social_video_embeds: simple_list(row.get(21)),
            quotations: parse_quotations(row.get(22)),
            all_names: parse_offset_pairs(row.get(23)),
            amounts: parse_amounts(row.get(24)),
            translation_info: parse_translation_info(row.get(25)),
            extras_xml: row.get_owned(26),
        })
    }

    fn from_map(map: &serde_json::Map<String, serde_json::Value>) -> Result<Gkg, RecordError> {
        // Warehouse rows carry the same nested text blobs as the file cells,
        // so cell-level decoding is shared with the row branch.
        if map_string(map, "GKGRECORDID").is_none() {
            return Err(RecordError::MissingField("GKGRECORDID"));
        }
        let columns = [
            "GKGRECORDID",
            "DATE",
            "SourceCollectionIdentifier",
            "SourceCommonName",
            "DocumentIdentifier",
            "V1Counts",
            "V21Counts",
            "V1Themes",
            "V2Themes",
            "V1Locations",
            "V2Locations",
            "V1Persons",
            "V2Persons",
            "V1Organizations",
            "V2Organizations",
            "V15Tone",
            "V21Dates",
            "GCAM",
            "V21SharingImage",
            "V21RelatedImages",
            "V21SocialImageEmbeds",
            "V21SocialVideoEmbeds",
            "V21Quotations",
            "V21AllNames",
            "V21Amounts",
            "V21TranslationInfo",
            "V2ExtrasXML",
        ];
        let fields: Vec<String> = columns
            .iter()
            .map(|col| map_string(map, col).unwrap_or_default())
            .collect();
        Self::from_row(&TabRow::new(fields, crate::raw::FormatVersion::V2))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::raw::FormatVersion;
    use pretty_assertions::assert_eq;

    fn gkg_row() -> TabRow {
        let mut fields = vec![String::new(); COLUMNS];
        fields[0] = "20240115001500-12".to_string();
        fields[1] = "20240115001500".to_string();
        fields[2] = "1".to_string();
        fields[3] = "example.com".to_string();
        fields[4] = "https://example.com/story".to_string();
        fields[7] = "TAX_POLICY;CLIMATE_CHANGE".to_string();
        fields[8] = "TAX_POLICY,102;CLIMATE_CHANGE,344".to_string();
        fields[9] = "3#Washington, District of Columbia, United States#US#USDC#38.8951#-77.0364#531871".to_string();
        fields[10] = "3#Washington, District of Columbia, United States#US#USDC#11001#38.8951#-77.0364#531871#210".to_string();
        fields[15] = "-2.5,1.2,3.7,4.9,21.3,0,512".to_string();
        fields[17] = "wc:512;c2.21:4;v10.1:3.1".to_string();
        fields[22] = "210#44#said#We will not accept this outcome".to_string();
        fields[24] = "1500,protesters,210;2.5,billion dollars,855".to_string();
        TabRow::new(fields, FormatVersion::V2)
    }

    #[test]
    fn nested_cells_decode() {
        let gkg = Gkg::from_row(&gkg_row()).unwrap();
        assert_eq!(gkg.version, GkgVersion::V2);
        assert_eq!(gkg.themes.len(), 2);
        assert_eq!(gkg.enhanced_themes[1].char_offset, Some(344));
        assert_eq!(gkg.locations[0].lat, Some(38.8951));
        assert_eq!(gkg.locations[0].adm2_code, None);
        assert_eq!(
            gkg.enhanced_locations[0].location.adm2_code.as_deref(),
            Some("11001")
        );
        assert_eq!(gkg.enhanced_locations[0].char_offset, Some(210));
        assert_eq!(gkg.gcam.len(), 3);
        assert_eq!(gkg.gcam[0].key, "wc");
        assert_eq!(gkg.quotations[0].verb.as_deref(), Some("said"));
        assert_eq!(
            gkg.quotations[0].quote,
            "We will not accept this outcome"
        );
        assert_eq!(gkg.amounts[0].amount, Some(1500.0));
        assert_eq!(gkg.amounts[1].object.as_deref(), Some("billion dollars"));
        let tone = gkg.tone.unwrap();
        assert_eq!(tone.tone, Some(-2.5));
        assert_eq!(tone.word_count, Some(512));
    }

    #[test]
    fn translation_marker_is_split_from_record_id() {
        let mut row = gkg_row();
        row.fields[0] = "20240115001500-T12".to_string();
        let gkg = Gkg::from_row(&row).unwrap();
        assert!(gkg.translated);
        assert_eq!(gkg.original_id, "20240115001500");
        assert_eq!(gkg.record_id, "20240115001500-T12");

        let plain = Gkg::from_row(&gkg_row()).unwrap();
        assert!(!plain.translated);
        assert_eq!(plain.original_id, plain.record_id);
    }

    #[test]
    fn v1_only_record_is_marked_v1() {
        let mut row = gkg_row();
        for idx in [6, 8, 10, 12, 14] {
            row.fields[idx] = String::new();
        }
        let gkg = Gkg::from_row(&row).unwrap();
        assert_eq!(gkg.version, GkgVersion::V1);
    }
}
