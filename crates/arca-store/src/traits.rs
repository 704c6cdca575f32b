use std::collections::HashSet;

use arca_types::{BlobId, NamespaceId};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::{StoreError, StoreResult};

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - Blobs are immutable once written. Content-addressing guarantees this:
///   the same bytes always produce the same id.
/// - `put` verifies the claimed id against the bytes before storing.
/// - Concurrent reads are always safe, and concurrent identical writes are
///   harmless no-ops.
/// - Namespaces are isolated storage domains.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `id`, returning the id.
    ///
    /// Fails with [`StoreError::HashMismatch`] if `data` does not hash to
    /// `id`. If the blob already exists this is a no-op.
    async fn put(&self, ns: &NamespaceId, id: &BlobId, data: Bytes) -> StoreResult<BlobId>;

    /// Read a blob. Fails with [`StoreError::NotFound`] if it is absent.
    async fn get(&self, ns: &NamespaceId, id: &BlobId) -> StoreResult<Bytes>;

    /// Check existence of many blobs at once. The result is positionally
    /// aligned with `ids`.
    async fn exists(&self, ns: &NamespaceId, ids: &[BlobId]) -> StoreResult<Vec<bool>>;

    /// Lazily enumerate every blob id in a namespace.
    fn enumerate<'a>(&'a self, ns: &'a NamespaceId) -> BoxStream<'a, StoreResult<BlobId>>;

    /// Delete a blob. Returns `true` if it existed.
    ///
    /// This is intended for garbage collection only. Deleting a blob that is
    /// still referenced breaks finalized records.
    async fn delete(&self, ns: &NamespaceId, id: &BlobId) -> StoreResult<bool>;

    /// Return the subset of `ids` that is absent, deduplicated, in first-seen
    /// order.
    async fn filter_missing(&self, ns: &NamespaceId, ids: &[BlobId]) -> StoreResult<Vec<BlobId>> {
        let mut seen = HashSet::new();
        let unique: Vec<BlobId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        let present = self.exists(ns, &unique).await?;
        Ok(unique
            .into_iter()
            .zip(present)
            .filter_map(|(id, present)| (!present).then_some(id))
            .collect())
    }

    /// Returns `true` if a single blob exists.
    async fn contains(&self, ns: &NamespaceId, id: &BlobId) -> StoreResult<bool> {
        let present = self.exists(ns, std::slice::from_ref(id)).await?;
        Ok(present.first().copied().unwrap_or(false))
    }
}

/// Verify that `data` hashes to `claimed`.
pub(crate) fn verify_hash(claimed: &BlobId, data: &[u8]) -> StoreResult<()> {
    let computed = arca_crypto::blob_id(data);
    if computed != *claimed {
        return Err(StoreError::HashMismatch {
            claimed: *claimed,
            computed,
        });
    }
    Ok(())
}
