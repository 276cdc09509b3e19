//! Error types for resultstore.

use std::io;
use thiserror::Error;

/// The result type used throughout resultstore.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for resultstore operations.
///
/// Lookup misses during search (unknown domain, unknown entity id, rows
/// excluded by a filter) are not errors; they shrink the result set.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The declared schema is malformed or unsupported.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Stored data violates the append-order contract, or a table linkage
    /// does not match the schema.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// A mutating operation was attempted on a store opened read-only.
    #[error("Table is read-only: {0}")]
    ReadOnly(String),

    /// The table is in a state that does not allow the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Data corruption was detected.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// A checksum mismatch was detected.
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// The expected checksum value.
        expected: u32,
        /// The actual checksum value.
        actual: u32,
    },

    /// The requested table or file was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The table already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Creates a new schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    /// Creates a new integrity error.
    pub fn integrity(msg: impl Into<String>) -> Self {
        Error::Integrity(msg.into())
    }

    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::schema("nested too deep");
        assert_eq!(err.to_string(), "Schema error: nested too deep");

        let err = Error::ChecksumMismatch { expected: 0x12345678, actual: 0x87654321 };
        assert!(err.to_string().contains("0x12345678"));
        assert!(err.to_string().contains("0x87654321"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_read_only_is_not_io() {
        let err = Error::ReadOnly("/RESULT/NODAL/DISPLACEMENT".to_string());
        assert!(!matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("Table is read-only"));
    }
}
