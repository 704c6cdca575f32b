use arca_types::{BlobId, NamespaceId};

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob was not found.
    #[error("blob not found: {id} in namespace {namespace}")]
    NotFound { namespace: NamespaceId, id: BlobId },

    /// The bytes supplied for a put do not hash to the claimed id.
    #[error("hash mismatch: claimed {claimed}, computed {computed}")]
    HashMismatch { claimed: BlobId, computed: BlobId },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored file name could not be parsed back into a blob id.
    #[error("corrupt blob entry {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// Storage backend is unavailable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns `true` if this error means the blob is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
