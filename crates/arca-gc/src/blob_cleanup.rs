use std::sync::Arc;

use arca_index::{BlobIndex, ContentIdStore};
use arca_refs::{FieldSelection, ReferencesStore};
use arca_store::BlobStore;
use arca_types::{BlobId, NamespaceId};
use futures::TryStreamExt;
use tracing::debug;

use crate::error::GcResult;

/// Reclaims blobs nothing refers to anymore.
///
/// A blob is removed only when the blob index lists at least one referrer,
/// every listed referrer record is gone, and no content id aliases it.
/// Blobs with no indexed referrer at all are kept: they may belong to an
/// upload whose record has not been written yet.
pub struct BlobCleanup {
    blobs: Arc<dyn BlobStore>,
    blob_index: Arc<dyn BlobIndex>,
    content_ids: Arc<dyn ContentIdStore>,
    refs: Arc<dyn ReferencesStore>,
}

impl BlobCleanup {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        blob_index: Arc<dyn BlobIndex>,
        content_ids: Arc<dyn ContentIdStore>,
        refs: Arc<dyn ReferencesStore>,
    ) -> Self {
        Self {
            blobs,
            blob_index,
            content_ids,
            refs,
        }
    }

    /// Sweep one namespace. Returns the blobs removed.
    pub async fn cleanup(&self, ns: &NamespaceId) -> GcResult<Vec<BlobId>> {
        let candidates: Vec<BlobId> = self.blobs.enumerate(ns).try_collect().await?;
        let mut removed = Vec::new();

        for blob in candidates {
            if !self.is_unreachable(ns, &blob).await? {
                continue;
            }
            if self.blobs.delete(ns, &blob).await? {
                self.blob_index.remove_blob(ns, &blob).await?;
                debug!(namespace = %ns, blob = %blob.short_hex(), "reclaimed blob");
                removed.push(blob);
            }
        }
        Ok(removed)
    }

    async fn is_unreachable(&self, ns: &NamespaceId, blob: &BlobId) -> GcResult<bool> {
        let referrers = self.blob_index.referrers(ns, blob).await?;
        if referrers.is_empty() {
            return Ok(false);
        }
        for referrer in &referrers {
            match self
                .refs
                .get(ns, &referrer.bucket, &referrer.key, FieldSelection::Metadata)
                .await
            {
                Ok(_) => return Ok(false),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(!self.content_ids.is_alias_target(ns, blob).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arca_index::{InMemoryBlobIndex, InMemoryContentIdStore};
    use arca_refs::InMemoryReferencesStore;
    use arca_store::InMemoryBlobStore;
    use arca_types::{BucketId, ContentId, RefKey};
    use bytes::Bytes;

    #[tokio::test]
    async fn reclaims_only_blobs_with_dead_referrers() {
        let ns = NamespaceId::new("test").unwrap();
        let bucket = BucketId::new("b").unwrap();
        let blobs = Arc::new(InMemoryBlobStore::new());
        let blob_index = Arc::new(InMemoryBlobIndex::new());
        let content_ids = Arc::new(InMemoryContentIdStore::new(blobs.clone()));
        let refs = Arc::new(InMemoryReferencesStore::new());

        let mut ids = Vec::new();
        for data in [&b"dead"[..], b"live", b"aliased", b"in-flight"] {
            let id = arca_crypto::blob_id(data);
            blobs.put(&ns, &id, Bytes::copy_from_slice(data)).await.unwrap();
            ids.push(id);
        }
        let (dead, live, aliased, in_flight) = (ids[0], ids[1], ids[2], ids[3]);

        let gone = RefKey::new("gone").unwrap();
        let alive = RefKey::new("alive").unwrap();
        refs.put(&ns, &bucket, &alive, &live, None, true).await.unwrap();
        blob_index.add_ref_to_blobs(&ns, &bucket, &gone, &[dead, aliased]).await.unwrap();
        blob_index.add_ref_to_blobs(&ns, &bucket, &alive, &[live]).await.unwrap();
        content_ids
            .put(&ns, &ContentId::from_hash([1; 32]), &aliased, 0)
            .await
            .unwrap();

        let cleanup = BlobCleanup::new(blobs.clone(), blob_index.clone(), content_ids, refs);
        assert_eq!(cleanup.cleanup(&ns).await.unwrap(), vec![dead]);

        assert!(!blobs.contains(&ns, &dead).await.unwrap());
        for kept in [live, aliased, in_flight] {
            assert!(blobs.contains(&ns, &kept).await.unwrap());
        }
        assert!(blob_index.referrers(&ns, &dead).await.unwrap().is_empty());

        assert!(cleanup.cleanup(&ns).await.unwrap().is_empty());
    }
}
