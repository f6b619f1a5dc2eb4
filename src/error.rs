//! Error types shared by the route layer.

/// Failure to fetch or decode the capital records.
#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed with status {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to read capitals: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse capitals: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// Loading the catalog failed. Fatal to the initial render, never retried here.
    #[error("data source error: {0}")]
    DataSource(#[from] DataSourceError),

    /// Catalog data is empty, duplicated or out of range.
    #[error("invalid capital data: {0}")]
    Validation(String),

    /// A capital or category lookup missed. Interaction code ignores these.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Bad distance-category partition or environment setting.
    #[error("configuration error: {0}")]
    Configuration(String),
}
