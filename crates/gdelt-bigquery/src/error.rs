/// Warehouse-side failure modes. All of these are fatal for the request
/// being served: the dispatcher does not fall back any further once the
/// warehouse itself fails.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("warehouse requested but no credentials are configured")]
    MissingCredentials,

    #[error("credentials path {path} resolves outside {parent}")]
    UnsafeCredentialsPath { path: String, parent: String },

    #[error("failed to read credentials: {0}")]
    CredentialsIo(#[from] std::io::Error),

    #[error("credentials are not a valid service-account key: {detail}")]
    InvalidCredentials { detail: String },

    #[error("token exchange failed: {detail}")]
    Auth { detail: String },

    #[error("column {column:?} is not in the allow-list for table {table}")]
    ColumnNotAllowed { table: &'static str, column: String },

    #[error("warehouse transport failure: {0}")]
    Http(#[from] reqwest::Error),

    #[error("warehouse API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("query did not complete within the configured timeout")]
    QueryTimeout,
}
