use arca_types::{BlobId, BucketId, NamespaceId, RefKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named pointer to a payload blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub namespace: NamespaceId,
    pub bucket: BucketId,
    pub key: RefKey,
    /// Hash of the encoded payload document.
    pub blob_id: BlobId,
    /// Copy of small payloads, so reads can skip the blob store.
    pub inline_payload: Option<Vec<u8>>,
    /// All blobs reachable from the payload were present when this record
    /// was last finalized.
    pub finalized: bool,
    pub last_modified: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
}

/// Which parts of a record a read needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FieldSelection {
    /// Metadata and payload.
    #[default]
    All,
    /// Metadata only; the inline payload is stripped.
    Metadata,
}

impl FieldSelection {
    /// Interpret a client's field list. No list, or an empty one, selects
    /// everything; otherwise the payload is included only when `"payload"`
    /// is named.
    pub fn from_fields<S: AsRef<str>>(fields: Option<&[S]>) -> Self {
        match fields {
            None => Self::All,
            Some([]) => Self::All,
            Some(fields) if fields.iter().any(|f| f.as_ref() == "payload") => Self::All,
            Some(_) => Self::Metadata,
        }
    }

    pub fn includes_payload(self) -> bool {
        self == Self::All
    }
}
