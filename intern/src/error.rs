//! Error types for intern-store operations.

use std::fmt;

/// Errors that can occur during interning operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternError {
    /// Address or payload is not present in the store/index.
    NotFound,

    /// The operating system could not back a new slab mapping.
    AllocationFailed,

    /// The codec rejected the input bytes.
    DecompressionFailed,

    /// Unrecognised or unimplemented compression selector.
    /// Construction fails with this error.
    BadConfiguration,

    /// A join was requested over an empty address list.
    Empty,

    /// A string operation encountered payload bytes that are not UTF-8.
    InvalidUtf8,
}

impl fmt::Display for InternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "object not found"),
            Self::AllocationFailed => write!(f, "slab allocation failed"),
            Self::DecompressionFailed => write!(f, "decompression failed"),
            Self::BadConfiguration => write!(f, "bad configuration"),
            Self::Empty => write!(f, "empty address list"),
            Self::InvalidUtf8 => write!(f, "payload is not valid UTF-8"),
        }
    }
}

impl std::error::Error for InternError {}

/// Result type for interning operations.
pub type InternResult<T> = Result<T, InternError>;
