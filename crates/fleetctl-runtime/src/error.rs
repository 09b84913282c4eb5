//! Error types for the object-store client and cache.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("object {namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    #[error("resourceVersion conflict writing {namespace}/{name}: expected {expected}, store has {actual}")]
    Conflict {
        namespace: String,
        name: String,
        expected: String,
        actual: String,
    },

    #[error("watch stream for {0} disconnected")]
    WatchDisconnected(String),

    #[error("transient store error: {0}")]
    Transient(String),

    #[error("request cancelled or deadline exceeded")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// True for errors the caller should retry with back-off rather than
    /// surface as a classified failure (spec.md 7, "transient" taxonomy).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { .. } | StoreError::Transient(_) | StoreError::WatchDisconnected(_)
        )
    }

    /// Ignorable per spec.md 7: not-found on delete, already-exists on an
    /// idempotent create.
    pub fn is_ignorable_on_delete(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_ignorable_on_create(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}
