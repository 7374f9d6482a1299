//! Error types for memodeck-store.
//!
//! Every completion resolves either success or one of these kinds; nothing
//! is logged away silently. Recovery is limited to reissuing the identical
//! idempotent operation.

use memodeck_core::ModelError;
use thiserror::Error;

/// Result type alias using StoreError.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failures surfaced by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced parent or child record is missing, or an entity was not
    /// in a persistable state. Fatal at the call site.
    #[error("invariant violation: {detail}")]
    InvariantViolation { detail: String },

    /// The key allocator exhausted its retries. Retry the whole operation.
    #[error("key allocation failed after {attempts} attempts under {collection}")]
    KeyCollision { collection: String, attempts: u32 },

    /// The same path was planned as both a save and a delete in one batch.
    /// Programmer error.
    #[error("path {path} planned as both save and delete")]
    ConflictingOps { path: String },

    /// The store rejected or timed out the update. The identical batch may
    /// be reissued; it converges to the same state.
    #[error("write not acknowledged for {} path(s)", paths.len())]
    WriteFailed { paths: Vec<String> },

    /// A read or subscription failed. Re-subscribing is safe; state is
    /// eventually consistent.
    #[error("read failed at {path}: {detail}")]
    ReadFailed { path: String, detail: String },
}

impl From<ModelError> for StoreError {
    fn from(err: ModelError) -> Self {
        StoreError::InvariantViolation {
            detail: err.to_string(),
        }
    }
}
