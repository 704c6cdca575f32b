use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use arca_types::{BlobId, BucketId, NamespaceId, RefKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::IndexResult;

/// A (bucket, key) pair that references a blob within a namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RefLocator {
    pub bucket: BucketId,
    pub key: RefKey,
}

impl RefLocator {
    pub fn new(bucket: BucketId, key: RefKey) -> Self {
        Self { bucket, key }
    }
}

/// Index from blob to the reference records that point at it.
///
/// Used only to estimate reachability for garbage collection. Readers must
/// re-verify blob existence against the blob store.
#[async_trait]
pub trait BlobIndex: Send + Sync {
    /// Record that `(bucket, key)` references each of `blobs`.
    ///
    /// Additive and idempotent: repeating the call changes nothing.
    async fn add_ref_to_blobs(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blobs: &[BlobId],
    ) -> IndexResult<()>;

    /// Every known referrer of `blob`, sorted.
    async fn referrers(&self, ns: &NamespaceId, blob: &BlobId) -> IndexResult<Vec<RefLocator>>;

    /// Forget a blob entirely. Called once the blob has been reclaimed.
    async fn remove_blob(&self, ns: &NamespaceId, blob: &BlobId) -> IndexResult<bool>;

    /// Forget every entry in a namespace. Returns the number of blobs dropped.
    async fn drop_namespace(&self, ns: &NamespaceId) -> IndexResult<u64>;
}

/// In-memory [`BlobIndex`] for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemoryBlobIndex {
    entries: RwLock<HashMap<NamespaceId, HashMap<BlobId, BTreeSet<RefLocator>>>>,
}

impl InMemoryBlobIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed blobs in a namespace.
    pub fn blob_count(&self, ns: &NamespaceId) -> usize {
        self.entries
            .read()
            .expect("lock poisoned")
            .get(ns)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl BlobIndex for InMemoryBlobIndex {
    async fn add_ref_to_blobs(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blobs: &[BlobId],
    ) -> IndexResult<()> {
        if blobs.is_empty() {
            return Ok(());
        }
        let locator = RefLocator::new(bucket.clone(), key.clone());
        let mut entries = self.entries.write().expect("lock poisoned");
        let namespace = entries.entry(ns.clone()).or_default();
        for blob in blobs {
            namespace
                .entry(*blob)
                .or_default()
                .insert(locator.clone());
        }
        debug!(namespace = %ns, bucket = %bucket, key = %key, count = blobs.len(), "indexed blob refs");
        Ok(())
    }

    async fn referrers(&self, ns: &NamespaceId, blob: &BlobId) -> IndexResult<Vec<RefLocator>> {
        let entries = self.entries.read().expect("lock poisoned");
        Ok(entries
            .get(ns)
            .and_then(|namespace| namespace.get(blob))
            .map(|refs| refs.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_blob(&self, ns: &NamespaceId, blob: &BlobId) -> IndexResult<bool> {
        let mut entries = self.entries.write().expect("lock poisoned");
        Ok(entries
            .get_mut(ns)
            .is_some_and(|namespace| namespace.remove(blob).is_some()))
    }

    async fn drop_namespace(&self, ns: &NamespaceId) -> IndexResult<u64> {
        let mut entries = self.entries.write().expect("lock poisoned");
        Ok(entries.remove(ns).map_or(0, |namespace| namespace.len() as u64))
    }
}
