use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arca_types::{BlobId, BucketId, NamespaceId, RefKey};

/// What happened to the object named by a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// The object was finalized and is now available.
    Added,
    /// The object was explicitly deleted.
    Deleted,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Added => "added",
            Self::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

/// One immutable entry of a namespace's replication log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationLogEntry {
    pub namespace: NamespaceId,
    pub bucket: BucketId,
    pub key: RefKey,
    pub blob: BlobId,
    pub kind: EventKind,
    /// Position within the namespace's log, starting at 1.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Display for ReplicationLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} {}/{}/{} -> {}",
            self.sequence,
            self.kind,
            self.namespace,
            self.bucket,
            self.key,
            self.blob.short_hex()
        )
    }
}
