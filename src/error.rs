//! Error types for typedkv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for typedkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    /// Invalid or conflicting tag registration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rejected input (empty list, empty key filter, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No tag resolves for the runtime type of a value being stored
    #[error("No converter tag is mapped for type `{0}`")]
    UnmappedType(String),

    /// The stored value exists but is not of the requested type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    /// Unknown tag or payload inconsistent with the codec framing
    #[error("Decode error: {0}")]
    Decode(String),

    /// Object converter failed to produce bytes
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log corruption detected: {0}")]
    LogCorruption(String),
}
