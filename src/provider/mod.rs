//! Field provider abstraction.
//!
//! Defines the [`FieldProvider`] trait and the validated input every provider
//! receives, so the extractor does not depend on a particular cloud service.

pub mod azure;

use std::path::Path;

use crate::error::InputError;
use crate::schema::Analysis;

/// Image formats accepted for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Jpeg,
    Png,
    Tiff,
}

impl MediaType {
    /// Parse a MIME type such as an upload's `Content-Type`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Guess from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        mime_guess::from_path(path)
            .iter()
            .find_map(|mime| Self::from_mime(mime.essence_str()))
    }

    pub fn as_mime(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
        }
    }
}

/// A validated, non-empty document ready to send to a provider.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub filename: String,
    pub media_type: MediaType,
    pub data: Vec<u8>,
}

impl DocumentInput {
    /// Validate raw upload bytes against their declared content type.
    pub fn from_bytes(
        filename: impl Into<String>,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<Self, InputError> {
        let filename = filename.into();
        let media_type = MediaType::from_mime(content_type)
            .ok_or_else(|| InputError::UnsupportedMediaType(content_type.to_string()))?;
        if data.is_empty() {
            return Err(InputError::EmptyFile(filename));
        }
        Ok(Self {
            filename,
            media_type,
            data,
        })
    }

    /// Read a file from disk, deriving the media type from its extension.
    pub fn from_path(path: &Path) -> Result<Self, InputError> {
        let display = path.display().to_string();
        let media_type = MediaType::from_path(path)
            .ok_or_else(|| InputError::UnsupportedMediaType(display.clone()))?;
        let data = std::fs::read(path).map_err(|source| InputError::Read {
            path: display.clone(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(display);
        Self::from_bytes(filename, media_type.as_mime(), data)
    }
}

/// Async trait implemented by each extraction backend.
#[async_trait::async_trait]
pub trait FieldProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn analyze(&self, input: &DocumentInput) -> anyhow::Result<Analysis>;
}
