use arca_types::{BlobId, BucketId, ContentId, NamespaceId, RefKey};

/// A payload could not be encoded or decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed payload: {0}")]
pub struct PayloadError(pub String);

/// Outcomes of reference resolution that stop it from returning the
/// reachable blob set.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// One or more content id aliases could not be resolved to a blob.
    /// `reachable` holds the blobs that were discovered anyway.
    #[error("{} content id(s) could not be resolved", .unresolved.len())]
    PartialReferenceResolve {
        unresolved: Vec<ContentId>,
        reachable: Vec<BlobId>,
    },

    /// Every alias resolved, but some reachable blobs are absent.
    /// `reachable` is the full set, present and missing alike.
    #[error("{} referenced blob(s) are missing", .missing.len())]
    ReferenceIsMissingBlobs {
        missing: Vec<BlobId>,
        reachable: Vec<BlobId>,
    },

    /// Attached objects nest deeper than the resolver allows.
    #[error("attachment nesting exceeds maximum depth {max_depth}")]
    DepthExceeded { max_depth: usize },

    /// An attached object blob does not hold a valid document.
    #[error("attached object {blob} is malformed: {source}")]
    MalformedAttachment {
        blob: BlobId,
        #[source]
        source: PayloadError,
    },

    #[error("store error: {0}")]
    Store(#[from] arca_store::StoreError),

    #[error("index error: {0}")]
    Index(#[from] arca_index::IndexError),
}

/// Errors from reference store and object service operations.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    /// No record exists under the given name.
    #[error("object {namespace}/{bucket}/{key} not found")]
    NotFound {
        namespace: NamespaceId,
        bucket: BucketId,
        key: RefKey,
    },

    /// The caller's blob id does not match the stored record.
    #[error("object {namespace}/{bucket}/{key} has blob {stored}, not {supplied}")]
    ObjectHashMismatch {
        namespace: NamespaceId,
        bucket: BucketId,
        key: RefKey,
        supplied: BlobId,
        stored: BlobId,
    },

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("store error: {0}")]
    Store(#[from] arca_store::StoreError),

    #[error("index error: {0}")]
    Index(#[from] arca_index::IndexError),

    #[error("replication error: {0}")]
    Replication(#[from] arca_replication::ReplicationError),
}

impl RefError {
    pub(crate) fn not_found(ns: &NamespaceId, bucket: &BucketId, key: &RefKey) -> Self {
        Self::NotFound {
            namespace: ns.clone(),
            bucket: bucket.clone(),
            key: key.clone(),
        }
    }

    /// Returns `true` if the record (or its payload blob) does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type RefResult<T> = Result<T, RefError>;

pub type ResolveResult<T> = Result<T, ResolveError>;
