//! Error types for decoding, transforming and indexing audio

use thiserror::Error;

/// Errors surfaced by the fingerprinting engine and its collaborators.
///
/// Decoder and shape errors abort the item being indexed or matched. Matching
/// itself never fails: "no match" is a regular [`crate::matching::MatchOutcome`].
#[derive(Error, Debug)]
pub enum TagError {
    /// Malformed container or header
    #[error("malformed audio container: {0}")]
    Format(String),

    /// Valid container but an encoding, bit depth or layout we cannot read
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Read failure, including truncated sample data
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Block handed to the transform whose length is not a power of two
    #[error("block length {len} is not a power of two")]
    Shape { len: usize },

    #[error("invalid fingerprint settings: {0}")]
    InvalidSettings(String),

    #[error("reference '{0}' is already indexed")]
    DuplicateReference(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<hound::Error> for TagError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => TagError::Io(e),
            hound::Error::FormatError(msg) => TagError::Format(msg.to_string()),
            hound::Error::Unsupported => {
                TagError::UnsupportedFormat("sample encoding not supported".to_string())
            }
            hound::Error::InvalidSampleFormat => {
                TagError::UnsupportedFormat("invalid sample format".to_string())
            }
            hound::Error::TooWide => {
                TagError::UnsupportedFormat("sample too wide for target type".to_string())
            }
            hound::Error::UnfinishedSample => TagError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "data chunk ends in the middle of a sample",
            )),
            other => TagError::Format(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TagError>;
