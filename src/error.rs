//! Error types for the relabel engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the relabel engine
///
/// Most failure paths inside the engine are not errors at all: elements that
/// are not targets or not yet rendered are skipped and retried on the next
/// pass. The variants below cover the few places where a caller has to know.
#[derive(Error, Debug)]
pub enum Error {
    /// A submitted color is not a 6-digit hex value
    #[error("Invalid color for `{slot}`: {value:?}")]
    InvalidColor { slot: String, value: String },

    /// A selector string could not be parsed
    #[error("Invalid selector: {0}")]
    Selector(String),

    /// The identifier pattern could not be compiled
    #[error("Invalid identifier pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The command destination no longer exists
    #[error("Command target unreachable: {0}")]
    Unreachable(String),

    /// The page answered, but not with what the command expects
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Persistent storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure should be treated as "try again later" rather
    /// than surfaced to the user
    pub fn is_soft(&self) -> bool {
        matches!(self, Error::Unreachable(_))
    }
}
