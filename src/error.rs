//! Input validation errors.

use thiserror::Error;

/// Why an uploaded file was rejected before analysis.
#[derive(Debug, Error)]
pub enum InputError {
    /// Only JPEG, PNG and TIFF images are analyzed
    #[error("Unsupported file format: {0}")]
    UnsupportedMediaType(String),

    #[error("Empty file: {0}")]
    EmptyFile(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
