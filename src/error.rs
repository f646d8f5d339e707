//! Error types for conversion operations

use thiserror::Error;

/// Main error type for the conversion pipeline
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("Size limit exceeded: input is {actual} bytes, limit is {limit} bytes")]
    SizeLimitExceeded { actual: u64, limit: u64 },

    #[error("Encoding failed at stage {stage}: {reason}")]
    EncodingFailure { stage: &'static str, reason: String },

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage backend error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Conversion cancelled at stage {0}")]
    Cancelled(&'static str),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Specialized Result type for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    /// Pipeline stage the error originated from, for the terminal result.
    pub fn stage(&self) -> &'static str {
        match self {
            ConvertError::Io(_) => "io",
            ConvertError::MalformedHeader(_) => "header-decode",
            ConvertError::UnsupportedFormat(_) => "compatibility-gate",
            ConvertError::SizeLimitExceeded { .. } => "compatibility-gate",
            ConvertError::EncodingFailure { stage, .. } => stage,
            ConvertError::Compression(_) => "compress",
            ConvertError::Decompression(_) => "compress",
            ConvertError::InvalidDimensions(_) => "brick-organize",
            ConvertError::Validation(_) => "structural-validate",
            ConvertError::Storage(_) => "persist",
            ConvertError::Serialization(_) => "assemble",
            ConvertError::Cancelled(stage) => stage,
            ConvertError::Configuration(_) => "configuration",
        }
    }

    /// Warnings never abort a conversion; everything else does.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ConvertError::Validation(_) | ConvertError::Storage(_)
        )
    }
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::Serialization(err.to_string())
    }
}
