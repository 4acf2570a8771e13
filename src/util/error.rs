//! Error types for the tileset validator.

use thiserror::Error;

/// Main error type for validator operations.
///
/// Most problems found in the validated data are *not* errors: they are
/// recorded as [`ValidationIssue`](crate::validation::ValidationIssue)s.
/// An `Error` means that an operation could not produce a result at all.
#[derive(Error, Debug)]
pub enum Error {
    /// A resource could not be resolved
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Data is truncated
    #[error("Unexpected end of data at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// The tile hierarchy could not be built (missing or corrupt subtree,
    /// invalid coordinates, invalid metadata needed for a tile).
    #[error("Implicit tiling error: {0}")]
    ImplicitTiling(String),

    /// An enum code that does not appear in the enum definition
    #[error("Value {value} is not a valid value of enum type '{enum_type}'")]
    UnknownEnumValue { enum_type: String, value: i64 },

    /// Type mismatch when reading data
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A broken internal assumption
    #[error("Internal error: {0}")]
    Internal(String),

    /// Image decoding failed
    #[error("Image error: {0}")]
    Image(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl Error {
    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create an implicit tiling error.
    pub fn tiling(msg: impl Into<String>) -> Self {
        Self::ImplicitTiling(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error means that the tile hierarchy cannot be trusted.
    pub fn is_tiling_error(&self) -> bool {
        matches!(self, Self::ImplicitTiling(_))
    }
}

/// Result type alias for validator operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::UnexpectedEof(12);
        assert!(e.to_string().contains("12"));

        let e = Error::UnknownEnumValue { enum_type: "Color".into(), value: 7 };
        assert!(e.to_string().contains("Color"));
        assert!(e.to_string().contains('7'));
    }

    #[test]
    fn test_tiling_error_class() {
        assert!(Error::tiling("missing subtree").is_tiling_error());
        assert!(!Error::internal("broken").is_tiling_error());
        assert!(!Error::invalid("bad").is_tiling_error());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
