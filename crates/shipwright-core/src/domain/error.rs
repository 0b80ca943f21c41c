//! Domain-level error taxonomy for shipwright.

/// Shipwright domain errors.
///
/// Extraction failures are deliberately absent: unreadable or
/// unparsable definition content yields an empty reference list, not
/// an error.
#[derive(Debug, thiserror::Error)]
pub enum ShipwrightError {
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("asset not found in workspace: {0}")]
    AssetNotFound(String),

    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    #[error("manifest digest mismatch: expected {expected}, got {actual}")]
    ManifestDigestMismatch { expected: String, actual: String },

    #[error("executor error: {0}")]
    Executor(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for shipwright domain operations.
pub type Result<T> = std::result::Result<T, ShipwrightError>;
