//! The Events table record.
//!
//! File layout is 61 TAB columns for v2 and 57 for v1: v1 lacks the three
//! `ADM2Code` geography columns and the source URL. Warehouse rows arrive as
//! column-name keyed mappings using the BigQuery names (`GLOBALEVENTID`,
//! `SQLDATE`, ...).

use super::{map_f64, map_i64, map_string, opt_float, opt_int};
use crate::raw::{FormatVersion, RawRecord, TabRow};
use crate::RecordError;
use serde::{Deserialize, Serialize};

/// One CAMEO actor block. All codes are strings; empty cells mean the field
/// was not coded for this event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub code: Option<String>,
    pub name: Option<String>,
    pub country_code: Option<String>,
    pub known_group_code: Option<String>,
    pub ethnic_code: Option<String>,
    pub religion1_code: Option<String>,
    pub religion2_code: Option<String>,
    pub type1_code: Option<String>,
    pub type2_code: Option<String>,
    pub type3_code: Option<String>,
}

impl Actor {
    fn is_empty(&self) -> bool {
        self.code.is_none() && self.name.is_none() && self.country_code.is_none()
    }
}

/// One geography block (actor 1, actor 2, or action).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventGeo {
    /// Resolution of the match: 1 country, 2 US state, 3 US city,
    /// 4 world city, 5 world state.
    pub geo_type: Option<u8>,
    pub full_name: Option<String>,
    pub country_code: Option<String>,
    pub adm1_code: Option<String>,
    /// Only present in v2 files.
    pub adm2_code: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub feature_id: Option<String>,
}

impl EventGeo {
    fn is_empty(&self) -> bool {
        self.geo_type.is_none() && self.full_name.is_none()
    }
}

/// A validated who-did-what-to-whom event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub global_event_id: i64,
    /// Event date as YYYYMMDD.
    pub day: Option<u32>,
    pub month_year: Option<u32>,
    pub year: Option<u32>,
    pub fraction_date: Option<f64>,
    pub actor1: Option<Actor>,
    pub actor2: Option<Actor>,
    pub is_root_event: bool,
    /// Full CAMEO code. Leading zeros are significant: `"0251"` and `"251"`
    /// are different codes.
    pub event_code: Option<String>,
    pub event_base_code: Option<String>,
    pub event_root_code: Option<String>,
    pub quad_class: Option<u8>,
    pub goldstein_scale: Option<f64>,
    pub num_mentions: Option<u32>,
    pub num_sources: Option<u32>,
    pub num_articles: Option<u32>,
    pub avg_tone: Option<f64>,
    pub actor1_geo: Option<EventGeo>,
    pub actor2_geo: Option<EventGeo>,
    pub action_geo: Option<EventGeo>,
    /// YYYYMMDDHHMMSS in v2 files, YYYYMMDD in v1.
    pub date_added: Option<i64>,
    /// Absent in v1 files.
    pub source_url: Option<String>,
}

pub(crate) const V2_COLUMNS: usize = 61;
pub(crate) const V1_COLUMNS: usize = 57;

fn actor_at(row: &TabRow, base: usize) -> Option<Actor> {
    let actor = Actor {
        code: row.get_owned(base),
        name: row.get_owned(base + 1),
        country_code: row.get_owned(base + 2),
        known_group_code: row.get_owned(base + 3),
        ethnic_code: row.get_owned(base + 4),
        religion1_code: row.get_owned(base + 5),
        religion2_code: row.get_owned(base + 6),
        type1_code: row.get_owned(base + 7),
        type2_code: row.get_owned(base + 8),
        type3_code: row.get_owned(base + 9),
    };
    (!actor.is_empty()).then_some(actor)
}

fn geo_at(row: &TabRow, base: usize, with_adm2: bool) -> Result<Option<EventGeo>, RecordError> {
    let adm2 = usize::from(with_adm2);
    let geo = EventGeo {
        geo_type: opt_int(row.get(base), base, "Geo_Type")?,
        full_name: row.get_owned(base + 1),
        country_code: row.get_owned(base + 2),
        adm1_code: row.get_owned(base + 3),
        adm2_code: if with_adm2 { row.get_owned(base + 4) } else { None },
        lat: opt_float(row.get(base + 4 + adm2), base + 4 + adm2, "Geo_Lat")?,
        lon: opt_float(row.get(base + 5 + adm2), base + 5 + adm2, "Geo_Long")?,
        feature_id: row.get_owned(base + 6 + adm2),
    };
    Ok((!geo.is_empty()).then_some(geo))
}

impl Event {
    pub fn from_raw(raw: &RawRecord) -> Result<Event, RecordError> {
        match raw {
            RawRecord::Row(row) => Self::from_row(row),
            RawRecord::Map(map) => Self::from_map(map),
        }
    }

    fn from_row(row: &TabRow) -> Result<Event, RecordError> {
        let expected = match row.version {
            FormatVersion::V2 => V2_COLUMNS,
            FormatVersion::V1 => V1_COLUMNS,
        };
        if row.fields.len() != expected {
            return Err(RecordError::ColumnCount {
                expected,
                actual: row.fields.len(),
            });
        }
        let with_adm2 = row.version == FormatVersion::V2;
        // Geography blocks are 8 columns in v2, 7 in v1.
        let geo_width = if with_adm2 { 8 } else { 7 };

        let global_event_id = opt_int(row.get(0), 0, "GlobalEventID")?
            .ok_or(RecordError::MissingField("GlobalEventID"))?;

        Ok(Event {
            global_event_id,
            day: opt_int(row.get(1), 1, "Day")?,
            month_year: opt_int(row.get(2), 2, "MonthYear")?,
            year: opt_int(row.get(3), 3, "Year")?,
            fraction_date: opt_float(row.get(4), 4, "FractionDate")?,
            actor1: actor_at(row, 5),
            actor2: actor_at(row, 15),
            is_root_event: row.get(25) == Some("1"),
            event_code: row.get_owned(26),
            event_base_code: row.get_owned(27),
            event_root_code: row.get_owned(28),
            quad_class: opt_int(row.get(29), 29, "QuadClass")?,
            goldstein_scale: opt_float(row.get(30), 30, "GoldsteinScale")?,
            num_mentions: opt_int(row.get(31), 31, "NumMentions")?,
            num_sources: opt_int(row.get(32), 32, "NumSources")?,
            num_articles: opt_int(row.get(33), 33, "NumArticles")?,
            avg_tone: opt_float(row.get(34), 34, "AvgTone")?,
            actor1_geo: geo_at(row, 35, with_adm2)?,
            actor2_geo: geo_at(row, 35 + geo_width, with_adm2)?,
            action_geo: geo_at(row, 35 + 2 * geo_width, with_adm2)?,
            date_added: opt_int(
                row.get(35 + 3 * geo_width),
                35 + 3 * geo_width,
                "DATEADDED",
            )?,
            source_url: if with_adm2 { row.get_owned(60) } else { None },
        })
    }

    fn from_map(map: &serde_json::Map<String, serde_json::Value>) -> Result<Event, RecordError> {
        let global_event_id =
            map_i64(map, "GLOBALEVENTID")?.ok_or(RecordError::MissingField("GLOBALEVENTID"))?;

        let actor = |prefix: &str| -> Option<Actor> {
            let field = |suffix: &str| map_string(map, &format!("{prefix}{suffix}"));
            let actor = Actor {
                code: field("Code"),
                name: field("Name"),
                country_code: field("CountryCode"),
                known_group_code: field("KnownGroupCode"),
                ethnic_code: field("EthnicCode"),
                religion1_code: field("Religion1Code"),
                religion2_code: field("Religion2Code"),
                type1_code: field("Type1Code"),
                type2_code: field("Type2Code"),
                type3_code: field("Type3Code"),
            };
            (!actor.is_empty()).then_some(actor)
        };

        let geo = |prefix: &str| -> Result<Option<EventGeo>, RecordError> {
            let s = |suffix: &str| map_string(map, &format!("{prefix}{suffix}"));
            let geo = EventGeo {
                geo_type: s("_Type").and_then(|t| t.parse().ok()),
                full_name: s("_FullName"),
                country_code: s("_CountryCode"),
                adm1_code: s("_ADM1Code"),
                adm2_code: s("_ADM2Code"),
                lat: s("_Lat").and_then(|v| v.parse().ok()),
                lon: s("_Long").and_then(|v| v.parse().ok()),
                feature_id: s("_FeatureID"),
            };
            Ok((!geo.is_empty()).then_some(geo))
        };

        Ok(Event {
            global_event_id,
            day: map_i64(map, "SQLDATE")?
                .or(map_i64(map, "Day")?)
                .map(|v| v as u32),
            month_year: map_i64(map, "MonthYear")?.map(|v| v as u32),
            year: map_i64(map, "Year")?.map(|v| v as u32),
            fraction_date: map_f64(map, "FractionDate")?,
            actor1: actor("Actor1"),
            actor2: actor("Actor2"),
            is_root_event: map_i64(map, "IsRootEvent")?.unwrap_or(0) == 1,
            event_code: map_string(map, "EventCode"),
            event_base_code: map_string(map, "EventBaseCode"),
            event_root_code: map_string(map, "EventRootCode"),
            quad_class: map_i64(map, "QuadClass")?.map(|v| v as u8),
            goldstein_scale: map_f64(map, "GoldsteinScale")?,
            num_mentions: map_i64(map, "NumMentions")?.map(|v| v as u32),
            num_sources: map_i64(map, "NumSources")?.map(|v| v as u32),
            num_articles: map_i64(map, "NumArticles")?.map(|v| v as u32),
            avg_tone: map_f64(map, "AvgTone")?,
            actor1_geo: geo("Actor1Geo")?,
            actor2_geo: geo("Actor2Geo")?,
            action_geo: geo("ActionGeo")?,
            date_added: map_i64(map, "DATEADDED")?,
            source_url: map_string(map, "SOURCEURL"),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn v2_fields() -> Vec<String> {
        let mut fields = vec![String::new(); V2_COLUMNS];
        fields[0] = "1037048304".to_string();
        fields[1] = "20240115".to_string();
        fields[2] = "202401".to_string();
        fields[3] = "2024".to_string();
        fields[4] = "2024.0411".to_string();
        fields[5] = "USA".to_string();
        fields[6] = "UNITED STATES".to_string();
        fields[25] = "1".to_string();
        fields[26] = "0251".to_string();
        fields[27] = "025".to_string();
        fields[28] = "02".to_string();
        fields[29] = "1".to_string();
        fields[30] = "-3.4".to_string();
        fields[31] = "12".to_string();
        fields[34] = "-2.751".to_string();
        // Action geography at columns 51..=58.
        fields[51] = "3".to_string();
        fields[52] = "Washington, District of Columbia, United States".to_string();
        fields[53] = "US".to_string();
        fields[54] = "USDC".to_string();
        fields[56] = "38.8951".to_string();
        fields[57] = "-77.0364".to_string();
        fields[58] = "531871".to_string();
        fields[59] = "20240115001500".to_string();
        fields[60] = "https://example.com/article".to_string();
        fields
    }

    #[test]
    fn v2_row_round_trips_leading_zeros() {
        let raw = RawRecord::Row(TabRow::new(v2_fields(), FormatVersion::V2));
        let event = Event::from_raw(&raw).unwrap();
        assert_eq!(event.global_event_id, 1037048304);
        assert_eq!(event.event_code.as_deref(), Some("0251"));
        assert_eq!(event.event_root_code.as_deref(), Some("02"));
        assert!(event.is_root_event);

        let action = event.action_geo.unwrap();
        assert_eq!(action.lat, Some(38.8951));
        assert_eq!(action.lon, Some(-77.0364));
        assert_eq!(action.adm2_code, None);
        assert_eq!(
            event.source_url.as_deref(),
            Some("https://example.com/article")
        );
    }

    #[test]
    fn empty_cells_become_absent_not_zero() {
        let raw = RawRecord::Row(TabRow::new(v2_fields(), FormatVersion::V2));
        let event = Event::from_raw(&raw).unwrap();
        assert_eq!(event.num_sources, None);
        assert_eq!(event.goldstein_scale, Some(-3.4));
        assert!(event.actor2.is_none());
    }

    #[test]
    fn column_count_mismatch_is_an_error() {
        let raw = RawRecord::Row(TabRow::new(vec![String::new(); 60], FormatVersion::V2));
        assert!(matches!(
            Event::from_raw(&raw),
            Err(RecordError::ColumnCount {
                expected: 61,
                actual: 60
            })
        ));
    }

    #[test]
    fn warehouse_mapping_validates_to_same_fields() {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_value(
            serde_json::json!({
                "GLOBALEVENTID": 1037048304i64,
                "SQLDATE": 20240115,
                "Actor1Code": "USA",
                "Actor1Name": "UNITED STATES",
                "IsRootEvent": 1,
                "EventCode": "0251",
                "EventBaseCode": "025",
                "EventRootCode": "02",
                "ActionGeo_FullName": "Washington, District of Columbia, United States",
                "ActionGeo_Lat": "38.8951",
                "ActionGeo_Long": "-77.0364",
                "SOURCEURL": "https://example.com/article",
            }),
        )
        .unwrap();
        let event = Event::from_raw(&RawRecord::Map(map)).unwrap();
        assert_eq!(event.event_code.as_deref(), Some("0251"));
        assert_eq!(event.action_geo.unwrap().lat, Some(38.8951));
    }
}
