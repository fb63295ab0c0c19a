//! Client library for GDELT (Global Database of Events, Language, and Tone).
//!
//! The library acquires news-event records, knowledge-graph annotations, and
//! word-frequency corpora from three surfaces behind one handle:
//!
//! - the rolling archive of 15-minute slot files, downloaded with a bounded
//!   sliding window and streamed with backpressure;
//! - the public BigQuery warehouse tables, used directly or as a transparent
//!   fallback when the file endpoints rate-limit or fail;
//! - the REST API surface (DOC, GEO, Context, TV, TV-AI).
//!
//! ```no_run
//! use futures::StreamExt;
//! use gdelt::{GdeltClient, DateRange, EventsFilter};
//!
//! # async fn example() -> Result<(), gdelt::Error> {
//! let client = GdeltClient::new().await?;
//! let range = DateRange::new(
//!     "2024-01-15T00:00:00Z".parse().unwrap(),
//!     "2024-01-15T06:00:00Z".parse().unwrap(),
//! );
//! let mut events = client.events(EventsFilter::new(range))?;
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event?.event_code);
//! }
//! # Ok(())
//! # }
//! ```

mod api;
mod client;
mod config;
mod dispatch;
mod error;
mod stream;

pub use client::GdeltClient;
pub use config::{ConfigOverlay, GdeltConfig};
pub use error::Error;
pub use stream::{FailedSlot, FetchResult, RecordStream};

pub use gdelt_model::{
    records, ContextFilter, DateRange, DedupStrategy, DocFilter, DocMode, ErrorPolicy,
    EventsFilter, GeoFilter, GkgFilter, GraphFilter, MentionsFilter, NGramsFilter, RecordType,
    SourcePreference, TvFilter, TvGkgFilter, VgkgFilter,
};

pub use gdelt_bigquery::WarehouseError;
pub use gdelt_files::slots::IndexEntry;
pub use gdelt_files::{BombReason, FetchError};
pub use gdelt_parser::extras;
