use std::sync::Arc;

use arca_index::{BlobIndex, ContentIdStore};
use arca_refs::{ObjectRecord, ReferencesStore};
use arca_types::NamespaceId;
use chrono::Utc;
use futures::TryStreamExt;
use tracing::debug;

use crate::error::GcResult;

/// Removes reference records that can no longer become useful.
///
/// A record is removed when it is unfinalized and was last modified longer
/// ago than `max_unfinalized_age`, or when it is orphaned: the blob index
/// lists no referrer of its blob and no content id aliases that blob.
/// Decisions are made against a snapshot, so a record that was put or
/// finalized after the snapshot was taken is left alone.
pub struct RefCleanup {
    refs: Arc<dyn ReferencesStore>,
    blob_index: Arc<dyn BlobIndex>,
    content_ids: Arc<dyn ContentIdStore>,
    max_unfinalized_age: chrono::Duration,
}

impl RefCleanup {
    pub fn new(
        refs: Arc<dyn ReferencesStore>,
        blob_index: Arc<dyn BlobIndex>,
        content_ids: Arc<dyn ContentIdStore>,
        max_unfinalized_age: chrono::Duration,
    ) -> Self {
        Self {
            refs,
            blob_index,
            content_ids,
            max_unfinalized_age,
        }
    }

    /// Sweep one namespace. Returns the records removed.
    pub async fn cleanup(&self, ns: &NamespaceId) -> GcResult<Vec<ObjectRecord>> {
        let records: Vec<ObjectRecord> = self.refs.records(ns).try_collect().await?;
        let now = Utc::now();
        let mut removed = Vec::new();

        for record in records {
            let stale = !record.finalized && now - record.last_modified >= self.max_unfinalized_age;
            if !stale && !self.is_orphaned(ns, &record).await? {
                continue;
            }
            if self.refs.delete_if_unchanged(ns, &record).await? {
                debug!(
                    namespace = %ns,
                    bucket = %record.bucket,
                    key = %record.key,
                    stale,
                    "removed reference record"
                );
                removed.push(record);
            } else {
                debug!(
                    namespace = %ns,
                    bucket = %record.bucket,
                    key = %record.key,
                    "reference record changed during sweep, kept"
                );
            }
        }
        Ok(removed)
    }

    async fn is_orphaned(&self, ns: &NamespaceId, record: &ObjectRecord) -> GcResult<bool> {
        if !self.blob_index.referrers(ns, &record.blob_id).await?.is_empty() {
            return Ok(false);
        }
        Ok(!self.content_ids.is_alias_target(ns, &record.blob_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arca_index::{InMemoryBlobIndex, InMemoryContentIdStore};
    use arca_refs::InMemoryReferencesStore;
    use arca_store::InMemoryBlobStore;
    use arca_index::{IndexResult, RefLocator};
    use arca_refs::FieldSelection;
    use arca_types::{BlobId, BucketId, ContentId, RefKey};
    use async_trait::async_trait;

    /// Blob index that finalizes one record the first time any referrer
    /// lookup happens, standing in for a client racing the sweep.
    struct RacingIndex {
        inner: InMemoryBlobIndex,
        refs: Arc<InMemoryReferencesStore>,
        ns: NamespaceId,
        bucket: BucketId,
        key: RefKey,
        blob: BlobId,
    }

    #[async_trait]
    impl BlobIndex for RacingIndex {
        async fn add_ref_to_blobs(
            &self,
            ns: &NamespaceId,
            bucket: &BucketId,
            key: &RefKey,
            blobs: &[BlobId],
        ) -> IndexResult<()> {
            self.inner.add_ref_to_blobs(ns, bucket, key, blobs).await
        }

        async fn referrers(&self, ns: &NamespaceId, blob: &BlobId) -> IndexResult<Vec<RefLocator>> {
            let _ = self
                .refs
                .finalize(&self.ns, &self.bucket, &self.key, &self.blob)
                .await;
            self.inner.referrers(ns, blob).await
        }

        async fn remove_blob(&self, ns: &NamespaceId, blob: &BlobId) -> IndexResult<bool> {
            self.inner.remove_blob(ns, blob).await
        }

        async fn drop_namespace(&self, ns: &NamespaceId) -> IndexResult<u64> {
            self.inner.drop_namespace(ns).await
        }
    }

    struct Fixture {
        ns: NamespaceId,
        bucket: BucketId,
        refs: Arc<InMemoryReferencesStore>,
        blob_index: Arc<InMemoryBlobIndex>,
        content_ids: Arc<InMemoryContentIdStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let blobs = Arc::new(InMemoryBlobStore::new());
            Self {
                ns: NamespaceId::new("test").unwrap(),
                bucket: BucketId::new("b").unwrap(),
                refs: Arc::new(InMemoryReferencesStore::new()),
                blob_index: Arc::new(InMemoryBlobIndex::new()),
                content_ids: Arc::new(InMemoryContentIdStore::new(blobs)),
            }
        }

        fn cleanup(&self, max_age: chrono::Duration) -> RefCleanup {
            RefCleanup::new(
                self.refs.clone(),
                self.blob_index.clone(),
                self.content_ids.clone(),
                max_age,
            )
        }

        /// Store a record and index it as its payload's referrer.
        async fn put(&self, key: &str, blob: BlobId, finalized: bool) {
            let key = RefKey::new(key).unwrap();
            self.refs
                .put(&self.ns, &self.bucket, &key, &blob, None, finalized)
                .await
                .unwrap();
            self.blob_index
                .add_ref_to_blobs(&self.ns, &self.bucket, &key, &[blob])
                .await
                .unwrap();
        }

        async fn keys(&self) -> Vec<String> {
            let records: Vec<ObjectRecord> = self.refs.records(&self.ns).try_collect().await.unwrap();
            records.into_iter().map(|r| r.key.to_string()).collect()
        }
    }

    #[tokio::test]
    async fn stale_unfinalized_records_are_removed() {
        let fx = Fixture::new();
        fx.put("pending", BlobId::from_hash([1; 32]), false).await;
        fx.put("done", BlobId::from_hash([2; 32]), true).await;

        let removed = fx.cleanup(chrono::Duration::zero()).cleanup(&fx.ns).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].key.as_str(), "pending");
        assert_eq!(fx.keys().await, vec!["done"]);

        // Nothing left to do.
        assert!(fx.cleanup(chrono::Duration::zero()).cleanup(&fx.ns).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn young_unfinalized_records_survive() {
        let fx = Fixture::new();
        fx.put("pending", BlobId::from_hash([1; 32]), false).await;
        let removed = fx.cleanup(chrono::Duration::hours(1)).cleanup(&fx.ns).await.unwrap();
        assert!(removed.is_empty());
    }

    #[tokio::test]
    async fn orphaned_records_are_removed_unless_aliased() {
        let fx = Fixture::new();
        let orphan_blob = BlobId::from_hash([3; 32]);
        let aliased_blob = BlobId::from_hash([4; 32]);
        for (key, blob) in [("orphan", orphan_blob), ("aliased", aliased_blob)] {
            fx.refs
                .put(&fx.ns, &fx.bucket, &RefKey::new(key).unwrap(), &blob, None, true)
                .await
                .unwrap();
        }
        fx.content_ids
            .put(&fx.ns, &ContentId::from_hash([9; 32]), &aliased_blob, 0)
            .await
            .unwrap();

        let removed = fx.cleanup(chrono::Duration::hours(1)).cleanup(&fx.ns).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].blob_id, orphan_blob);
        assert_eq!(fx.keys().await, vec!["aliased"]);
    }

    #[tokio::test]
    async fn record_finalized_during_sweep_survives() {
        let fx = Fixture::new();
        let done_blob = BlobId::from_hash([5; 32]);
        let pending_blob = BlobId::from_hash([6; 32]);
        // "a" sorts first, so its orphan check runs before "b" is visited.
        fx.put("a", done_blob, true).await;
        fx.put("b", pending_blob, false).await;

        let index = Arc::new(RacingIndex {
            inner: InMemoryBlobIndex::new(),
            refs: fx.refs.clone(),
            ns: fx.ns.clone(),
            bucket: fx.bucket.clone(),
            key: RefKey::new("b").unwrap(),
            blob: pending_blob,
        });
        index
            .add_ref_to_blobs(&fx.ns, &fx.bucket, &RefKey::new("a").unwrap(), &[done_blob])
            .await
            .unwrap();

        let cleanup = RefCleanup::new(
            fx.refs.clone(),
            index,
            fx.content_ids.clone(),
            chrono::Duration::zero(),
        );
        let removed = cleanup.cleanup(&fx.ns).await.unwrap();
        assert!(removed.is_empty());

        let survivor = fx
            .refs
            .get(&fx.ns, &fx.bucket, &RefKey::new("b").unwrap(), FieldSelection::Metadata)
            .await
            .unwrap();
        assert!(survivor.finalized);
        assert_eq!(fx.keys().await, vec!["a", "b"]);
    }
}
