use arca_types::{BlobId, BucketId, NamespaceId, RefKey};
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::RefResult;
use crate::record::{FieldSelection, ObjectRecord};

/// Storage interface for reference records.
///
/// Implementations must make [`finalize`](Self::finalize) atomic per key:
/// of several concurrent calls for the same unfinalized record, exactly one
/// returns `true`.
#[async_trait]
pub trait ReferencesStore: Send + Sync {
    /// Read a record. Fails with `RefError::NotFound` if absent.
    async fn get(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        fields: FieldSelection,
    ) -> RefResult<ObjectRecord>;

    /// Insert or replace a record.
    ///
    /// Re-putting the blob the record already points at never clears
    /// `finalized`. Putting a different blob replaces the record and takes
    /// `finalized` from the argument.
    async fn put(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
        inline_payload: Option<Vec<u8>>,
        finalized: bool,
    ) -> RefResult<()>;

    /// Mark a record finalized. Returns `true` only if this call moved it
    /// from unfinalized to finalized. Fails with `ObjectHashMismatch` if
    /// the record points at a different blob.
    async fn finalize(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
    ) -> RefResult<bool>;

    /// Update last access time.
    async fn touch(&self, ns: &NamespaceId, bucket: &BucketId, key: &RefKey) -> RefResult<()>;

    /// Remove a record. Returns `true` if it existed.
    async fn delete(&self, ns: &NamespaceId, bucket: &BucketId, key: &RefKey) -> RefResult<bool>;

    /// Remove the record at `expected`'s location only if it still points
    /// at the same blob with the same `finalized` flag and `last_modified`
    /// time. Returns `true` if it was removed. The comparison and removal
    /// are atomic with respect to [`put`](Self::put) and
    /// [`finalize`](Self::finalize).
    async fn delete_if_unchanged(&self, ns: &NamespaceId, expected: &ObjectRecord) -> RefResult<bool>;

    /// Remove every record in a namespace. Returns the count removed.
    async fn drop_namespace(&self, ns: &NamespaceId) -> RefResult<u64>;

    /// Remove every record in a bucket. Returns the count removed.
    async fn delete_bucket(&self, ns: &NamespaceId, bucket: &BucketId) -> RefResult<u64>;

    /// Namespaces holding at least one record. Each call starts a fresh
    /// enumeration.
    fn namespaces(&self) -> BoxStream<'_, RefResult<NamespaceId>>;

    /// Every record of a namespace, metadata only.
    fn records<'a>(&'a self, ns: &'a NamespaceId) -> BoxStream<'a, RefResult<ObjectRecord>>;
}
