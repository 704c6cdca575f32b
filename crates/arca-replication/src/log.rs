use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use arca_types::{BlobId, BucketId, NamespaceId, RefKey};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::ReplicationResult;
use crate::event::{EventKind, ReplicationLogEntry};
use crate::wal::{SyncMode, WriteAheadLog};

/// Default capacity of the subscription channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Ordered, per-namespace log of object events.
///
/// Sequences start at 1 and increase by exactly one per appended entry.
/// Entries are never modified once appended.
#[async_trait]
pub trait ReplicationLog: Send + Sync {
    /// Record that an object was finalized.
    async fn insert_add_event(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
    ) -> ReplicationResult<ReplicationLogEntry>;

    /// Record that an object was explicitly deleted.
    async fn insert_delete_event(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
    ) -> ReplicationResult<ReplicationLogEntry>;

    /// Up to `limit` entries with a sequence strictly greater than `after`,
    /// in sequence order.
    async fn read_from(
        &self,
        ns: &NamespaceId,
        after: u64,
        limit: usize,
    ) -> ReplicationResult<Vec<ReplicationLogEntry>>;

    /// Sequence of the newest entry, or 0 for an empty namespace.
    async fn last_sequence(&self, ns: &NamespaceId) -> ReplicationResult<u64>;

    /// Namespaces with at least one entry.
    async fn namespaces(&self) -> ReplicationResult<Vec<NamespaceId>>;

    /// Receive entries appended from now on. Slow receivers observe
    /// `RecvError::Lagged` and should catch up with [`Self::read_from`].
    fn subscribe(&self) -> broadcast::Receiver<ReplicationLogEntry>;
}

/// Sequencing core shared by the log backends.
struct Sequencer {
    logs: RwLock<BTreeMap<NamespaceId, Vec<ReplicationLogEntry>>>,
    events: broadcast::Sender<ReplicationLogEntry>,
}

impl Sequencer {
    fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            logs: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    /// Load recovered entries, dropping duplicates and flagging gaps.
    fn restore(&self, entries: Vec<ReplicationLogEntry>) {
        let mut logs = self.logs.write().expect("lock poisoned");
        for entry in entries {
            let log = logs.entry(entry.namespace.clone()).or_default();
            let last = log.last().map_or(0, |e| e.sequence);
            if entry.sequence <= last {
                warn!(namespace = %entry.namespace, sequence = entry.sequence, last, "duplicate recovered entry; skipping");
                continue;
            }
            if entry.sequence != last + 1 {
                warn!(namespace = %entry.namespace, sequence = entry.sequence, expected = last + 1, "gap in recovered log");
            }
            log.push(entry);
        }
    }

    /// Assign the next sequence, persist, then publish. The write lock is
    /// held through `persist` so file order matches sequence order.
    fn append<F>(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
        kind: EventKind,
        persist: F,
    ) -> ReplicationResult<ReplicationLogEntry>
    where
        F: FnOnce(&ReplicationLogEntry) -> ReplicationResult<()>,
    {
        let mut logs = self.logs.write().expect("lock poisoned");
        let log = logs.entry(ns.clone()).or_default();
        let entry = ReplicationLogEntry {
            namespace: ns.clone(),
            bucket: bucket.clone(),
            key: key.clone(),
            blob: *blob,
            kind,
            sequence: log.last().map_or(0, |e| e.sequence) + 1,
            timestamp: Utc::now(),
        };
        persist(&entry)?;
        log.push(entry.clone());
        drop(logs);

        // No receivers is fine.
        let _ = self.events.send(entry.clone());
        debug!(namespace = %ns, sequence = entry.sequence, kind = %kind, blob = %blob.short_hex(), "replication event appended");
        Ok(entry)
    }

    fn read_from(&self, ns: &NamespaceId, after: u64, limit: usize) -> Vec<ReplicationLogEntry> {
        let logs = self.logs.read().expect("lock poisoned");
        let Some(log) = logs.get(ns) else {
            return Vec::new();
        };
        let start = log.partition_point(|e| e.sequence <= after);
        log[start..].iter().take(limit).cloned().collect()
    }

    fn last_sequence(&self, ns: &NamespaceId) -> u64 {
        let logs = self.logs.read().expect("lock poisoned");
        logs.get(ns)
            .and_then(|log| log.last())
            .map_or(0, |e| e.sequence)
    }

    fn namespaces(&self) -> Vec<NamespaceId> {
        self.logs.read().expect("lock poisoned").keys().cloned().collect()
    }
}

/// Replication log held entirely in memory.
pub struct InMemoryReplicationLog {
    inner: Sequencer,
}

impl InMemoryReplicationLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a log whose subscription channel buffers `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Sequencer::new(capacity),
        }
    }
}

impl Default for InMemoryReplicationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryReplicationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryReplicationLog")
            .field("namespaces", &self.inner.namespaces().len())
            .finish()
    }
}

#[async_trait]
impl ReplicationLog for InMemoryReplicationLog {
    async fn insert_add_event(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
    ) -> ReplicationResult<ReplicationLogEntry> {
        self.inner
            .append(ns, bucket, key, blob, EventKind::Added, |_| Ok(()))
    }

    async fn insert_delete_event(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
    ) -> ReplicationResult<ReplicationLogEntry> {
        self.inner
            .append(ns, bucket, key, blob, EventKind::Deleted, |_| Ok(()))
    }

    async fn read_from(
        &self,
        ns: &NamespaceId,
        after: u64,
        limit: usize,
    ) -> ReplicationResult<Vec<ReplicationLogEntry>> {
        Ok(self.inner.read_from(ns, after, limit))
    }

    async fn last_sequence(&self, ns: &NamespaceId) -> ReplicationResult<u64> {
        Ok(self.inner.last_sequence(ns))
    }

    async fn namespaces(&self) -> ReplicationResult<Vec<NamespaceId>> {
        Ok(self.inner.namespaces())
    }

    fn subscribe(&self) -> broadcast::Receiver<ReplicationLogEntry> {
        self.inner.events.subscribe()
    }
}

/// Replication log persisted to a [`WriteAheadLog`] and rebuilt from it on
/// open. An entry is visible to readers only after it reached the file.
pub struct WalReplicationLog {
    inner: Sequencer,
    wal: WriteAheadLog,
}

impl WalReplicationLog {
    /// Open (or create) the log file at `path` and replay it.
    pub fn open(path: &Path, sync_mode: SyncMode) -> ReplicationResult<Self> {
        Self::open_with_capacity(path, sync_mode, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn open_with_capacity(
        path: &Path,
        sync_mode: SyncMode,
        capacity: usize,
    ) -> ReplicationResult<Self> {
        let wal = WriteAheadLog::open(path, sync_mode)?;
        let recovered = wal.recover()?;
        let count = recovered.len();

        let inner = Sequencer::new(capacity);
        inner.restore(recovered);

        info!(path = %path.display(), recovered = count, "replication log opened");
        Ok(Self { inner, wal })
    }

    pub fn wal(&self) -> &WriteAheadLog {
        &self.wal
    }
}

impl std::fmt::Debug for WalReplicationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalReplicationLog")
            .field("wal", &self.wal)
            .finish()
    }
}

#[async_trait]
impl ReplicationLog for WalReplicationLog {
    async fn insert_add_event(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
    ) -> ReplicationResult<ReplicationLogEntry> {
        self.inner.append(ns, bucket, key, blob, EventKind::Added, |entry| {
            self.wal.append(entry).map(|_| ())
        })
    }

    async fn insert_delete_event(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
    ) -> ReplicationResult<ReplicationLogEntry> {
        self.inner.append(ns, bucket, key, blob, EventKind::Deleted, |entry| {
            self.wal.append(entry).map(|_| ())
        })
    }

    async fn read_from(
        &self,
        ns: &NamespaceId,
        after: u64,
        limit: usize,
    ) -> ReplicationResult<Vec<ReplicationLogEntry>> {
        Ok(self.inner.read_from(ns, after, limit))
    }

    async fn last_sequence(&self, ns: &NamespaceId) -> ReplicationResult<u64> {
        Ok(self.inner.last_sequence(ns))
    }

    async fn namespaces(&self) -> ReplicationResult<Vec<NamespaceId>> {
        Ok(self.inner.namespaces())
    }

    fn subscribe(&self) -> broadcast::Receiver<ReplicationLogEntry> {
        self.inner.events.subscribe()
    }
}
