//! Error types for the pdf2md library.

use std::io;
use thiserror::Error;

use crate::parser::ObjectId;

/// Result type alias for pdf2md operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF processing.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The byte stream is empty or is not a PDF at all.
    #[error("Invalid input: {0}")]
    Input(String),

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Header, trailer or object framing could not be understood.
    #[error("Malformed PDF container at byte {offset}: {message}")]
    MalformedContainer { offset: usize, message: String },

    /// The cross-reference table or stream is unreadable.
    #[error("Corrupt cross-reference data at byte {offset}: {message}")]
    CorruptCrossReference { offset: usize, message: String },

    /// Low-level syntax error while tokenizing.
    #[error("Syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// A reference points to an object that does not exist or cannot be parsed.
    #[error("Unresolved object reference: {0}")]
    UnresolvedReference(ObjectId),

    /// Reference resolution looped back onto an object already being resolved.
    #[error("Circular reference detected at {0}")]
    CircularReference(ObjectId),

    /// A PDF object was accessed as the wrong variant.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A stream filter failed.
    #[error("Stream decode error: {0}")]
    StreamDecode(String),

    /// A single page could not be decoded. Recovered into a warning by the converter.
    #[error("Page {page} could not be decoded: {message}")]
    PageDecode { page: u32, message: String },

    /// The document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// The caller cancelled the conversion.
    #[error("Conversion cancelled")]
    Cancelled,

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn malformed(offset: usize, message: impl Into<String>) -> Self {
        Error::MalformedContainer {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn xref(offset: usize, message: impl Into<String>) -> Self {
        Error::CorruptCrossReference {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            offset,
            message: message.into(),
        }
    }

    /// Whether degraded linear-scan recovery may repair this error.
    pub fn is_recoverable_container_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedContainer { .. }
                | Error::CorruptCrossReference { .. }
                | Error::Syntax { .. }
                | Error::UnresolvedReference(_)
                | Error::TypeMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Encrypted;
        assert_eq!(err.to_string(), "Document is encrypted");

        let err = Error::CorruptCrossReference {
            offset: 120,
            message: "bad entry".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Corrupt cross-reference data at byte 120: bad entry"
        );

        let err = Error::UnresolvedReference(ObjectId::new(12, 0));
        assert_eq!(err.to_string(), "Unresolved object reference: 12 0 R");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::xref(0, "x").is_recoverable_container_error());
        assert!(Error::malformed(0, "x").is_recoverable_container_error());
        assert!(!Error::Encrypted.is_recoverable_container_error());
        assert!(!Error::Input("empty".into()).is_recoverable_container_error());
    }
}
