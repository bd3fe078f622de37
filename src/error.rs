use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse flow input JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Invalid flow {flow}: {reason}")]
    InvalidFlow { flow: String, reason: String },

    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("Cached computation for key '{key}' failed: {message}")]
    ComputeFailed { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
