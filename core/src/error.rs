use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Database error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection pool exhausted after waiting {waited_ms} ms")]
    PoolExhausted { waited_ms: u64 },

    #[error("Connection failed liveness probe")]
    ConnectionInvalid,

    #[error("Invalid report parameters: {0}")]
    Validation(String),

    #[error("Reducer configuration error: missing territory key '{key}'")]
    Reducer { key: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;
