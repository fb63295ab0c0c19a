//! Core data model for the GDELT client: query filters, raw and validated
//! records, deduplication strategies, and the static code tables that filter
//! validation consults.
//!
//! Nothing in this crate performs I/O. Parsing raw bytes into [`RawRecord`]s
//! lives in `gdelt-parser`; turning a `RawRecord` into a validated record is
//! the `from_raw` constructor on each record type here.

mod dedup;
mod error;
mod filters;
mod lookup;
mod raw;
pub mod records;

pub use dedup::{DedupKey, DedupStrategy};
pub use error::RecordError;
pub use filters::{
    archive_epoch, ContextFilter, DateRange, DocFilter, DocMode, ErrorPolicy, EventsFilter,
    FilterError, GeoFilter, GkgFilter, GraphFilter, MentionsFilter, NGramsFilter,
    SourcePreference, TvFilter, TvGkgFilter, VgkgFilter, MAX_SPAN_DAYS,
};
pub use lookup::{cameo_root_label, is_fips_country, is_valid_cameo_root};
pub use raw::{FormatVersion, RawRecord, TabRow};

use serde::{Deserialize, Serialize};

/// Every record shape the acquisition engine can deliver. The variant
/// determines slot cadence, file suffix, warehouse table, and parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Events,
    Mentions,
    Gkg,
    Vgkg,
    TvGkg,
    WebNgrams,
    BroadcastNgrams,
    QuoteGraph,
    EntityGraph,
    FrontpageGraph,
    GeoGraph,
    EmbeddedMetadataGraph,
    ArticleListGraph,
}

impl RecordType {
    /// Record types published as TAB-delimited slot files. The remainder are
    /// JSON-lines.
    pub fn is_tab_delimited(&self) -> bool {
        matches!(
            self,
            RecordType::Events
                | RecordType::Mentions
                | RecordType::Gkg
                | RecordType::Vgkg
                | RecordType::TvGkg
                | RecordType::BroadcastNgrams
                | RecordType::FrontpageGraph
        )
    }

    /// The widest date range a single request may span, in days.
    pub fn max_span_days(&self) -> i64 {
        match self {
            RecordType::FrontpageGraph => 30,
            _ => 7,
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordType::Events => "events",
            RecordType::Mentions => "mentions",
            RecordType::Gkg => "gkg",
            RecordType::Vgkg => "vgkg",
            RecordType::TvGkg => "tv-gkg",
            RecordType::WebNgrams => "web-ngrams",
            RecordType::BroadcastNgrams => "broadcast-ngrams",
            RecordType::QuoteGraph => "quote-graph",
            RecordType::EntityGraph => "entity-graph",
            RecordType::FrontpageGraph => "frontpage-graph",
            RecordType::GeoGraph => "geo-graph",
            RecordType::EmbeddedMetadataGraph => "embedded-metadata-graph",
            RecordType::ArticleListGraph => "article-list-graph",
        };
        f.write_str(name)
    }
}
