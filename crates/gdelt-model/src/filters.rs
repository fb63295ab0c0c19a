//! Immutable query specifications.
//!
//! Each record family gets its own filter struct with explicit optional
//! selectors. Filters validate themselves up front so that source code paths
//! can assume a well-formed request.

use crate::{lookup, RecordType};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::DedupStrategy;

/// Hard ceiling on any request span, regardless of record type.
pub const MAX_SPAN_DAYS: i64 = 365;

/// The earliest instant for which GDELT 2.0 slot files exist.
pub fn archive_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 2, 18, 0, 0, 0).unwrap()
}

/// Filter validation failure. Fatal: a request is never attempted with an
/// invalid filter.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("date range is empty or inverted: [{start}, {end})")]
    EmptyRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("date range spans {actual} days, limit for {record_type} is {limit}")]
    SpanTooWide {
        record_type: RecordType,
        actual: i64,
        limit: i64,
    },

    #[error("range starts {start}, before the archive epoch 2015-02-18")]
    BeforeEpoch { start: DateTime<Utc> },

    #[error("unknown FIPS country code {0:?}")]
    UnknownCountry(String),

    #[error("invalid CAMEO code {0:?}")]
    InvalidCameo(String),
}

/// A half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        DateRange { start, end }
    }

    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Checks the range against the per-type span limit and the overall
    /// safety cap.
    pub fn validate_for(&self, record_type: RecordType) -> Result<(), FilterError> {
        if self.end <= self.start {
            return Err(FilterError::EmptyRange {
                start: self.start,
                end: self.end,
            });
        }
        if self.start < archive_epoch() {
            return Err(FilterError::BeforeEpoch { start: self.start });
        }
        let limit = record_type.max_span_days().min(MAX_SPAN_DAYS);
        // Round up: a six-hour range still counts as a day against the limit.
        let actual = (self.end - self.start + chrono::Duration::hours(23)).num_days();
        if actual > limit {
            return Err(FilterError::SpanTooWide {
                record_type,
                actual,
                limit,
            });
        }
        Ok(())
    }
}

/// How per-slot failures are routed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Propagate the first failure, terminating the stream.
    Raise,
    /// Log at WARN, record in the fetch result, continue.
    #[default]
    Warn,
    /// Log at DEBUG, record in the fetch result, continue.
    Skip,
}

/// Which acquisition source to use for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePreference {
    /// Files first, warehouse on fallback.
    #[default]
    Auto,
    Files,
    Warehouse,
}

fn validate_countries(codes: &[String]) -> Result<(), FilterError> {
    for code in codes {
        if !lookup::is_fips_country(code) {
            return Err(FilterError::UnknownCountry(code.clone()));
        }
    }
    Ok(())
}

fn validate_cameo(codes: &[String]) -> Result<(), FilterError> {
    for code in codes {
        let ok = (2..=4).contains(&code.len())
            && code.bytes().all(|b| b.is_ascii_digit())
            && lookup::is_valid_cameo_root(&code[..2]);
        if !ok {
            return Err(FilterError::InvalidCameo(code.clone()));
        }
    }
    Ok(())
}

/// Events table query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsFilter {
    pub range: DateRange,
    /// FIPS country codes matched against any actor or action geography.
    #[serde(default)]
    pub countries: Vec<String>,
    /// CAMEO event codes; leading zeros are significant.
    #[serde(default)]
    pub cameo_codes: Vec<String>,
    /// Also enumerate the translated-file variant.
    #[serde(default)]
    pub translated: bool,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub dedup: DedupStrategy,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    #[serde(default)]
    pub source: SourcePreference,
}

impl EventsFilter {
    pub fn new(range: DateRange) -> Self {
        EventsFilter {
            range,
            countries: Vec::new(),
            cameo_codes: Vec::new(),
            translated: false,
            limit: None,
            dedup: DedupStrategy::default(),
            error_policy: ErrorPolicy::default(),
            source: SourcePreference::default(),
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        self.range.validate_for(RecordType::Events)?;
        validate_countries(&self.countries)?;
        validate_cameo(&self.cameo_codes)?;
        Ok(())
    }
}

/// Mentions table query. Mentions are event-id keyed, so the warehouse is the
/// natural source; the file path requires scanning every slot in range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionsFilter {
    pub range: DateRange,
    /// Global event ids whose mentions are requested. Empty selects all.
    #[serde(default)]
    pub event_ids: Vec<i64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    #[serde(default)]
    pub source: SourcePreference,
}

impl MentionsFilter {
    pub fn new(range: DateRange) -> Self {
        MentionsFilter {
            range,
            event_ids: Vec::new(),
            limit: None,
            error_policy: ErrorPolicy::default(),
            source: SourcePreference::default(),
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        self.range.validate_for(RecordType::Mentions)
    }
}

/// Global Knowledge Graph query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GkgFilter {
    pub range: DateRange,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    /// ISO language codes; only meaningful with `translated`.
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub translated: bool,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub dedup: DedupStrategy,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    #[serde(default)]
    pub source: SourcePreference,
}

impl GkgFilter {
    pub fn new(range: DateRange) -> Self {
        GkgFilter {
            range,
            themes: Vec::new(),
            countries: Vec::new(),
            languages: Vec::new(),
            translated: false,
            limit: None,
            dedup: DedupStrategy::default(),
            error_policy: ErrorPolicy::default(),
            source: SourcePreference::default(),
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        self.range.validate_for(RecordType::Gkg)?;
        validate_countries(&self.countries)?;
        Ok(())
    }
}

/// Visual GKG query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VgkgFilter {
    pub range: DateRange,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

impl VgkgFilter {
    pub fn new(range: DateRange) -> Self {
        VgkgFilter {
            range,
            limit: None,
            error_policy: ErrorPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        self.range.validate_for(RecordType::Vgkg)
    }
}

/// TV GKG (closed-caption) query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvGkgFilter {
    pub range: DateRange,
    #[serde(default)]
    pub stations: Vec<String>,
    #[serde(default)]
    pub shows: Vec<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

impl TvGkgFilter {
    pub fn new(range: DateRange) -> Self {
        TvGkgFilter {
            range,
            stations: Vec::new(),
            shows: Vec::new(),
            limit: None,
            error_policy: ErrorPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        self.range.validate_for(RecordType::TvGkg)
    }
}

/// Web or broadcast n-gram query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NGramsFilter {
    pub range: DateRange,
    #[serde(default)]
    pub languages: Vec<String>,
    /// Restrict to specific surface strings.
    #[serde(default)]
    pub ngrams: Vec<String>,
    /// Broadcast only: station selectors.
    #[serde(default)]
    pub stations: Vec<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    #[serde(default)]
    pub source: SourcePreference,
}

impl NGramsFilter {
    pub fn new(range: DateRange) -> Self {
        NGramsFilter {
            range,
            languages: Vec::new(),
            ngrams: Vec::new(),
            stations: Vec::new(),
            limit: None,
            error_policy: ErrorPolicy::default(),
            source: SourcePreference::default(),
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        self.range.validate_for(RecordType::WebNgrams)
    }
}

/// Query over one of the six graph datasets. The concrete dataset is the
/// `record_type`, restricted to the graph variants by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphFilter {
    pub record_type: RecordType,
    pub range: DateRange,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

impl GraphFilter {
    pub fn new(record_type: RecordType, range: DateRange) -> Self {
        GraphFilter {
            record_type,
            range,
            limit: None,
            error_policy: ErrorPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        self.range.validate_for(self.record_type)
    }
}

/// DOC 2.0 full-text search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocFilter {
    pub query: String,
    #[serde(default)]
    pub mode: DocMode,
    #[serde(default)]
    pub timespan: Option<String>,
    #[serde(default)]
    pub range: Option<DateRange>,
    #[serde(default)]
    pub max_records: Option<u32>,
    #[serde(default)]
    pub source_language: Option<String>,
    #[serde(default)]
    pub source_country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocMode {
    #[default]
    ArtList,
    TimelineVol,
    TimelineVolRaw,
    TimelineTone,
    TimelineLang,
    TimelineSourceCountry,
}

impl DocMode {
    pub fn as_param(&self) -> &'static str {
        match self {
            DocMode::ArtList => "artlist",
            DocMode::TimelineVol => "timelinevol",
            DocMode::TimelineVolRaw => "timelinevolraw",
            DocMode::TimelineTone => "timelinetone",
            DocMode::TimelineLang => "timelinelang",
            DocMode::TimelineSourceCountry => "timelinesourcecountry",
        }
    }
}

/// GEO 2.0 geographic search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoFilter {
    pub query: String,
    #[serde(default)]
    pub timespan: Option<String>,
    #[serde(default)]
    pub max_points: Option<u32>,
}

/// Context 2.0 contextual snippet search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFilter {
    pub query: String,
    #[serde(default)]
    pub timespan: Option<String>,
    #[serde(default)]
    pub max_records: Option<u32>,
}

/// TV 2.0 / TV-AI closed-caption search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvFilter {
    pub query: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub timespan: Option<String>,
    #[serde(default)]
    pub stations: Vec<String>,
    #[serde(default)]
    pub max_records: Option<u32>,
}

#[cfg(test)]
mod test {
    use super::*;

    fn range(days: i64) -> DateRange {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        DateRange::new(start, start + chrono::Duration::days(days))
    }

    #[test]
    fn span_limits_are_per_record_type() {
        assert!(range(7).validate_for(RecordType::Events).is_ok());
        assert!(matches!(
            range(8).validate_for(RecordType::Events),
            Err(FilterError::SpanTooWide { limit: 7, .. })
        ));
        assert!(range(30).validate_for(RecordType::FrontpageGraph).is_ok());
        assert!(matches!(
            range(31).validate_for(RecordType::FrontpageGraph),
            Err(FilterError::SpanTooWide { limit: 30, .. })
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            DateRange::new(start, end).validate_for(RecordType::Events),
            Err(FilterError::EmptyRange { .. })
        ));
    }

    #[test]
    fn pre_epoch_range_is_rejected() {
        let start = Utc.with_ymd_and_hms(2014, 1, 1, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::days(1);
        assert!(matches!(
            DateRange::new(start, end).validate_for(RecordType::Events),
            Err(FilterError::BeforeEpoch { .. })
        ));
    }

    #[test]
    fn cameo_codes_keep_leading_zeros() {
        let mut filter = EventsFilter::new(range(1));
        filter.cameo_codes = vec!["0251".to_string(), "010".to_string()];
        assert!(filter.validate().is_ok());

        filter.cameo_codes = vec!["9990".to_string()];
        assert!(matches!(
            filter.validate(),
            Err(FilterError::InvalidCameo(_))
        ));
    }

    #[test]
    fn unknown_country_is_rejected() {
        let mut filter = EventsFilter::new(range(1));
        filter.countries = vec!["US".to_string(), "ZZ".to_string()];
        assert!(matches!(
            filter.validate(),
            Err(FilterError::UnknownCountry(code)) if code == "ZZ"
        ));
    }
}
