//! Error types for chat-memory
//!
//! This module defines the error taxonomy used throughout the crate,
//! using `thiserror` for ergonomic error handling.
//!
//! Read paths never surface these errors to callers: store reads degrade to
//! their "not found" values. Write paths, page validation, directory access
//! and failed generation turns report them explicitly.

use thiserror::Error;

/// Main error type for conversation memory operations
#[derive(Error, Debug)]
pub enum MemoryError {
    /// The remote conversation store could not be reached or rejected a write
    #[error("Conversation store unavailable: {0}")]
    StoreUnavailable(String),

    /// A page request was outside the accepted range
    #[error("Invalid page request: {0}")]
    InvalidPageRequest(String),

    /// Directory enumeration was requested without authorization
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// The generation source failed before the response was complete
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The turn was dropped before the response stream finished
    #[error("Turn cancelled before the response stream finished")]
    Cancelled,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MemoryError {
    /// Returns true when the error originates from the backing store
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<redis::RedisError> for MemoryError {
    fn from(err: redis::RedisError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Result type alias for chat-memory operations
///
/// Uses `anyhow::Error` so context can be attached while propagating;
/// typed failures are recovered with `downcast_ref::<MemoryError>()`.
pub type Result<T> = anyhow::Result<T>;
