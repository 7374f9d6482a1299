//! Error types for memodeck-core.

use thiserror::Error;

/// Result type alias using ModelError.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Invariant violations raised by the entity model.
///
/// Every variant here is fatal at the call site: it means the caller tried
/// to serialize or address an entity that is not in a persistable state.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{entity} has no key assigned")]
    MissingKey { entity: &'static str },

    #[error("{entity} has no parent")]
    MissingParent { entity: &'static str },

    #[error("invalid path segment: {segment:?}")]
    InvalidSegment { segment: String },

    #[error("invalid interval table: {detail}")]
    InvalidIntervals { detail: String },

    #[error("node serialization failed: {0}")]
    Node(#[from] serde_json::Error),
}
