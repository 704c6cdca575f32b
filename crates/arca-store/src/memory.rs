use std::collections::HashMap;
use std::sync::RwLock;

use arca_types::{BlobId, NamespaceId};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{StoreError, StoreResult};
use crate::traits::{verify_hash, BlobStore};

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Blobs are held behind a `RwLock` and
/// shared cheaply through [`Bytes`]. The lock is never held across an await.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<NamespaceId, HashMap<BlobId, Bytes>>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs stored in a namespace.
    pub fn len(&self, ns: &NamespaceId) -> usize {
        self.blobs
            .read()
            .expect("lock poisoned")
            .get(ns)
            .map_or(0, HashMap::len)
    }

    /// Returns `true` if the namespace holds no blobs.
    pub fn is_empty(&self, ns: &NamespaceId) -> bool {
        self.len(ns) == 0
    }

    /// Total bytes across all namespaces.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .flat_map(HashMap::values)
            .map(|b| b.len() as u64)
            .sum()
    }

    /// Return a sorted list of all blob ids in a namespace.
    pub fn all_ids(&self, ns: &NamespaceId) -> Vec<BlobId> {
        let map = self.blobs.read().expect("lock poisoned");
        let mut ids: Vec<BlobId> = map
            .get(ns)
            .map(|blobs| blobs.keys().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, ns: &NamespaceId, id: &BlobId, data: Bytes) -> StoreResult<BlobId> {
        verify_hash(id, &data)?;
        let mut map = self.blobs.write().expect("lock poisoned");
        map.entry(ns.clone())
            .or_default()
            .entry(*id)
            .or_insert(data);
        Ok(*id)
    }

    async fn get(&self, ns: &NamespaceId, id: &BlobId) -> StoreResult<Bytes> {
        let map = self.blobs.read().expect("lock poisoned");
        map.get(ns)
            .and_then(|blobs| blobs.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                namespace: ns.clone(),
                id: *id,
            })
    }

    async fn exists(&self, ns: &NamespaceId, ids: &[BlobId]) -> StoreResult<Vec<bool>> {
        let map = self.blobs.read().expect("lock poisoned");
        let blobs = map.get(ns);
        Ok(ids
            .iter()
            .map(|id| blobs.is_some_and(|b| b.contains_key(id)))
            .collect())
    }

    fn enumerate<'a>(&'a self, ns: &'a NamespaceId) -> BoxStream<'a, StoreResult<BlobId>> {
        stream::iter(self.all_ids(ns).into_iter().map(Ok)).boxed()
    }

    async fn delete(&self, ns: &NamespaceId, id: &BlobId) -> StoreResult<bool> {
        let mut map = self.blobs.write().expect("lock poisoned");
        Ok(map
            .get_mut(ns)
            .is_some_and(|blobs| blobs.remove(id).is_some()))
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let namespaces = self.blobs.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryBlobStore")
            .field("namespaces", &namespaces)
            .finish()
    }
}
