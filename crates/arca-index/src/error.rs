use arca_types::{ContentId, NamespaceId};

/// Errors from index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The content id has no candidate whose blob still exists.
    #[error("content id {content_id} not found in namespace {namespace}")]
    ContentIdNotFound {
        namespace: NamespaceId,
        content_id: ContentId,
    },

    /// Failure in the blob store while verifying candidates.
    #[error("store error: {0}")]
    Store(#[from] arca_store::StoreError),
}

impl IndexError {
    /// Returns `true` if this error means the alias could not be resolved.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ContentIdNotFound { .. })
    }
}

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
