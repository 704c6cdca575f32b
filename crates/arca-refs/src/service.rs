//! The object service: reference records plus their finalization protocol.

use std::sync::Arc;

use arca_index::{BlobIndex, ContentIdStore};
use arca_replication::ReplicationLog;
use arca_store::{BlobStore, StoreError};
use arca_types::{BlobId, BucketId, ContentId, NamespaceId, RefKey};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryFutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ReferencesConfig;
use crate::error::{RefError, RefResult, ResolveError};
use crate::payload::Document;
use crate::record::{FieldSelection, ObjectRecord};
use crate::resolver::ReferenceResolver;
use crate::traits::ReferencesStore;

/// What a put or finalize still needs before the record can finalize.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOutcome {
    /// Aliases that resolve to no blob.
    pub missing_content_ids: Vec<ContentId>,
    /// Reachable blobs absent from the blob store.
    pub missing_blobs: Vec<BlobId>,
}

impl PutOutcome {
    /// Nothing is missing.
    pub fn is_complete(&self) -> bool {
        self.missing_content_ids.is_empty() && self.missing_blobs.is_empty()
    }
}

/// Coordinates the reference store, blob store, indices and replication
/// log behind the object operations.
pub struct ObjectService {
    refs: Arc<dyn ReferencesStore>,
    blobs: Arc<dyn BlobStore>,
    blob_index: Arc<dyn BlobIndex>,
    replication: Arc<dyn ReplicationLog>,
    resolver: ReferenceResolver,
    config: ReferencesConfig,
}

impl ObjectService {
    pub fn new(
        refs: Arc<dyn ReferencesStore>,
        blobs: Arc<dyn BlobStore>,
        content_ids: Arc<dyn ContentIdStore>,
        blob_index: Arc<dyn BlobIndex>,
        replication: Arc<dyn ReplicationLog>,
        config: ReferencesConfig,
    ) -> Self {
        let resolver = ReferenceResolver::new(blobs.clone(), content_ids)
            .with_max_depth(config.max_resolve_depth);
        Self {
            refs,
            blobs,
            blob_index,
            replication,
            resolver,
            config,
        }
    }

    /// Read a record, with its payload when `fields` selects it.
    ///
    /// No field list, or an empty one, selects everything; otherwise the
    /// payload is returned only if `"payload"` is listed.
    pub async fn get(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        fields: Option<&[String]>,
    ) -> RefResult<(ObjectRecord, Option<Bytes>)> {
        let selection = FieldSelection::from_fields(fields);
        let record = self.refs.get(ns, bucket, key, selection).await?;

        if let Err(e) = self.refs.touch(ns, bucket, key).await {
            warn!(namespace = %ns, bucket = %bucket, key = %key, error = %e, "failed to track last access");
        }

        let payload = if selection.includes_payload() {
            Some(self.payload_bytes(ns, &record).await?)
        } else {
            None
        };
        Ok((record, payload))
    }

    /// Store a record and its payload, then finalize it if every blob the
    /// payload reaches is present.
    ///
    /// The record is written unfinalized while references resolve. The
    /// returned outcome lists what is still missing; both lists are empty
    /// when the record was finalized.
    pub async fn put(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
        payload: Bytes,
    ) -> RefResult<PutOutcome> {
        let computed = arca_crypto::blob_id(&payload);
        if computed != *blob {
            return Err(StoreError::HashMismatch {
                claimed: *blob,
                computed,
            }
            .into());
        }
        let document = Document::decode(&payload)?;
        let inline = (payload.len() <= self.config.max_inline_payload_size).then(|| payload.to_vec());

        let ((), _, (), outcome) = tokio::try_join!(
            self.refs.put(ns, bucket, key, blob, inline, false),
            self.blobs.put(ns, blob, payload.clone()).err_into::<RefError>(),
            self.blob_index
                .add_ref_to_blobs(ns, bucket, key, std::slice::from_ref(blob))
                .err_into::<RefError>(),
            self.check_references(ns, bucket, key, &document),
        )?;

        if outcome.is_complete() {
            self.finalize_record(ns, bucket, key, blob).await?;
        } else {
            debug!(
                namespace = %ns,
                bucket = %bucket,
                key = %key,
                missing_content_ids = outcome.missing_content_ids.len(),
                missing_blobs = outcome.missing_blobs.len(),
                "object stored unfinalized"
            );
        }
        Ok(outcome)
    }

    /// Retry finalization of a stored record after its missing content was
    /// uploaded. `blob` must match the stored record.
    pub async fn finalize(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
    ) -> RefResult<PutOutcome> {
        let record = self.refs.get(ns, bucket, key, FieldSelection::All).await?;
        if record.blob_id != *blob {
            return Err(RefError::ObjectHashMismatch {
                namespace: ns.clone(),
                bucket: bucket.clone(),
                key: key.clone(),
                supplied: *blob,
                stored: record.blob_id,
            });
        }

        let payload = self.payload_bytes(ns, &record).await?;
        let document = Document::decode(&payload)?;
        let outcome = self.check_references(ns, bucket, key, &document).await?;
        if outcome.is_complete() {
            self.finalize_record(ns, bucket, key, blob).await?;
        }
        Ok(outcome)
    }

    /// Delete a record and log the deletion. Blob bytes are left for GC.
    pub async fn delete(&self, ns: &NamespaceId, bucket: &BucketId, key: &RefKey) -> RefResult<bool> {
        let record = match self.refs.get(ns, bucket, key, FieldSelection::Metadata).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };
        if !self.refs.delete(ns, bucket, key).await? {
            return Ok(false);
        }
        self.replication
            .insert_delete_event(ns, bucket, key, &record.blob_id)
            .await?;
        debug!(namespace = %ns, bucket = %bucket, key = %key, "object deleted");
        Ok(true)
    }

    pub async fn delete_bucket(&self, ns: &NamespaceId, bucket: &BucketId) -> RefResult<u64> {
        let removed = self.refs.delete_bucket(ns, bucket).await?;
        info!(namespace = %ns, bucket = %bucket, removed, "bucket deleted");
        Ok(removed)
    }

    /// Remove every record of a namespace and forget its blob index.
    pub async fn drop_namespace(&self, ns: &NamespaceId) -> RefResult<u64> {
        let removed = self.refs.drop_namespace(ns).await?;
        self.blob_index.drop_namespace(ns).await?;
        info!(namespace = %ns, removed, "namespace dropped");
        Ok(removed)
    }

    /// Lazily enumerate known namespaces.
    pub fn namespaces(&self) -> BoxStream<'_, RefResult<NamespaceId>> {
        self.refs.namespaces()
    }

    pub fn refs(&self) -> &Arc<dyn ReferencesStore> {
        &self.refs
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn replication(&self) -> &Arc<dyn ReplicationLog> {
        &self.replication
    }

    pub fn config(&self) -> &ReferencesConfig {
        &self.config
    }

    async fn payload_bytes(&self, ns: &NamespaceId, record: &ObjectRecord) -> RefResult<Bytes> {
        match &record.inline_payload {
            Some(inline) if !inline.is_empty() => Ok(Bytes::from(inline.clone())),
            _ => Ok(self.blobs.get(ns, &record.blob_id).await?),
        }
    }

    /// Resolve the payload's references and index them. Resolution
    /// shortfalls become the outcome's missing lists; whatever was
    /// reachable is indexed on every path so blob cleanup never sees a
    /// referenced blob as unowned.
    async fn check_references(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        document: &Document,
    ) -> RefResult<PutOutcome> {
        if !document.has_attachments() {
            return Ok(PutOutcome::default());
        }
        let (reachable, outcome) = match self.resolver.resolve(ns, document).await {
            Ok(references) => (references, PutOutcome::default()),
            Err(ResolveError::PartialReferenceResolve {
                unresolved,
                reachable,
            }) => (
                reachable,
                PutOutcome {
                    missing_content_ids: unresolved,
                    missing_blobs: Vec::new(),
                },
            ),
            Err(ResolveError::ReferenceIsMissingBlobs { missing, reachable }) => (
                reachable,
                PutOutcome {
                    missing_content_ids: Vec::new(),
                    missing_blobs: missing,
                },
            ),
            Err(e) => return Err(e.into()),
        };
        if !reachable.is_empty() {
            self.blob_index
                .add_ref_to_blobs(ns, bucket, key, &reachable)
                .await?;
        }
        Ok(outcome)
    }

    /// Finalize and publish. Only the call that performs the transition
    /// appends the `Added` event.
    async fn finalize_record(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
    ) -> RefResult<()> {
        if self.refs.finalize(ns, bucket, key, blob).await? {
            let entry = self
                .replication
                .insert_add_event(ns, bucket, key, blob)
                .await?;
            debug!(namespace = %ns, bucket = %bucket, key = %key, sequence = entry.sequence, "object finalized");
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObjectService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectService")
            .field("resolver", &self.resolver)
            .field("config", &self.config)
            .finish()
    }
}
