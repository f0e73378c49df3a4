use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Extraction produced zero chunks; the file is rejected.
    #[error("No content could be extracted from {0}")]
    UnsupportedOrEmptyContent(String),

    #[error("Length mismatch: {texts} texts, {vectors} vectors, {attributes} attribute sets")]
    LengthMismatch {
        texts: usize,
        vectors: usize,
        attributes: usize,
    },

    #[error("Invalid k: {0} (must be at least 1)")]
    InvalidK(usize),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Data source not found: {0}")]
    NotFound(String),

    #[error("File {name} is {size} bytes, limit is {limit}")]
    FileTooLarge { name: String, size: u64, limit: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
