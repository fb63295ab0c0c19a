use gdelt_bigquery::WarehouseError;
use gdelt_files::FetchError;
use gdelt_model::FilterError;

/// Unified library error. Slot-scoped failures normally travel through the
/// fetch result's failure ledger instead; this type is what surfaces when a
/// failure is fatal for the whole request (or when the filter's error policy
/// is `raise`).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("configuration error: {detail}")]
    Config { detail: String },

    #[error("endpoint {url} returned an unusable response: {detail}")]
    Endpoint { url: String, detail: String },

    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),
}
