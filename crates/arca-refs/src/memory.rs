//! In-memory reference store.
//!
//! [`InMemoryReferencesStore`] keeps every record in nested maps behind a
//! single `RwLock`. Per-key transitions happen under the write lock, which
//! gives [`ReferencesStore::finalize`] its exactly-once guarantee.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use arca_types::{BlobId, BucketId, NamespaceId, RefKey};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{RefError, RefResult};
use crate::record::{FieldSelection, ObjectRecord};
use crate::traits::ReferencesStore;

type Records = BTreeMap<(BucketId, RefKey), ObjectRecord>;

#[derive(Debug, Default)]
pub struct InMemoryReferencesStore {
    namespaces: RwLock<HashMap<NamespaceId, Records>>,
}

impl InMemoryReferencesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a namespace.
    pub fn len(&self, ns: &NamespaceId) -> usize {
        self.namespaces
            .read()
            .expect("lock poisoned")
            .get(ns)
            .map_or(0, |records| records.len())
    }

    pub fn is_empty(&self, ns: &NamespaceId) -> bool {
        self.len(ns) == 0
    }

    fn snapshot_records(&self, ns: &NamespaceId) -> Vec<ObjectRecord> {
        self.namespaces
            .read()
            .expect("lock poisoned")
            .get(ns)
            .map(|records| records.values().map(strip_payload).collect())
            .unwrap_or_default()
    }
}

fn strip_payload(record: &ObjectRecord) -> ObjectRecord {
    ObjectRecord {
        inline_payload: None,
        ..record.clone()
    }
}

fn locator(bucket: &BucketId, key: &RefKey) -> (BucketId, RefKey) {
    (bucket.clone(), key.clone())
}

#[async_trait]
impl ReferencesStore for InMemoryReferencesStore {
    async fn get(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        fields: FieldSelection,
    ) -> RefResult<ObjectRecord> {
        let namespaces = self.namespaces.read().expect("lock poisoned");
        let record = namespaces
            .get(ns)
            .and_then(|records| records.get(&locator(bucket, key)))
            .ok_or_else(|| RefError::not_found(ns, bucket, key))?;
        Ok(if fields.includes_payload() {
            record.clone()
        } else {
            strip_payload(record)
        })
    }

    async fn put(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
        inline_payload: Option<Vec<u8>>,
        finalized: bool,
    ) -> RefResult<()> {
        let now = Utc::now();
        let mut namespaces = self.namespaces.write().expect("lock poisoned");
        let records = namespaces.entry(ns.clone()).or_default();

        match records.get_mut(&locator(bucket, key)) {
            Some(existing) if existing.blob_id == *blob => {
                existing.inline_payload = inline_payload;
                existing.finalized |= finalized;
                existing.last_modified = now;
                existing.last_access = now;
            }
            _ => {
                records.insert(
                    locator(bucket, key),
                    ObjectRecord {
                        namespace: ns.clone(),
                        bucket: bucket.clone(),
                        key: key.clone(),
                        blob_id: *blob,
                        inline_payload,
                        finalized,
                        last_modified: now,
                        last_access: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn finalize(
        &self,
        ns: &NamespaceId,
        bucket: &BucketId,
        key: &RefKey,
        blob: &BlobId,
    ) -> RefResult<bool> {
        let mut namespaces = self.namespaces.write().expect("lock poisoned");
        let record = namespaces
            .get_mut(ns)
            .and_then(|records| records.get_mut(&locator(bucket, key)))
            .ok_or_else(|| RefError::not_found(ns, bucket, key))?;

        if record.blob_id != *blob {
            return Err(RefError::ObjectHashMismatch {
                namespace: ns.clone(),
                bucket: bucket.clone(),
                key: key.clone(),
                supplied: *blob,
                stored: record.blob_id,
            });
        }
        if record.finalized {
            return Ok(false);
        }
        record.finalized = true;
        record.last_modified = Utc::now();
        Ok(true)
    }

    async fn touch(&self, ns: &NamespaceId, bucket: &BucketId, key: &RefKey) -> RefResult<()> {
        let mut namespaces = self.namespaces.write().expect("lock poisoned");
        let record = namespaces
            .get_mut(ns)
            .and_then(|records| records.get_mut(&locator(bucket, key)))
            .ok_or_else(|| RefError::not_found(ns, bucket, key))?;
        record.last_access = Utc::now();
        Ok(())
    }

    async fn delete(&self, ns: &NamespaceId, bucket: &BucketId, key: &RefKey) -> RefResult<bool> {
        let mut namespaces = self.namespaces.write().expect("lock poisoned");
        let Some(records) = namespaces.get_mut(ns) else {
            return Ok(false);
        };
        let removed = records.remove(&locator(bucket, key)).is_some();
        if records.is_empty() {
            namespaces.remove(ns);
        }
        Ok(removed)
    }

    async fn delete_if_unchanged(&self, ns: &NamespaceId, expected: &ObjectRecord) -> RefResult<bool> {
        let mut namespaces = self.namespaces.write().expect("lock poisoned");
        let Some(records) = namespaces.get_mut(ns) else {
            return Ok(false);
        };
        let at = locator(&expected.bucket, &expected.key);
        let unchanged = records.get(&at).is_some_and(|current| {
            current.blob_id == expected.blob_id
                && current.finalized == expected.finalized
                && current.last_modified == expected.last_modified
        });
        if !unchanged {
            return Ok(false);
        }
        records.remove(&at);
        if records.is_empty() {
            namespaces.remove(ns);
        }
        Ok(true)
    }

    async fn drop_namespace(&self, ns: &NamespaceId) -> RefResult<u64> {
        let mut namespaces = self.namespaces.write().expect("lock poisoned");
        Ok(namespaces.remove(ns).map_or(0, |records| records.len() as u64))
    }

    async fn delete_bucket(&self, ns: &NamespaceId, bucket: &BucketId) -> RefResult<u64> {
        let mut namespaces = self.namespaces.write().expect("lock poisoned");
        let Some(records) = namespaces.get_mut(ns) else {
            return Ok(0);
        };
        let before = records.len();
        records.retain(|(b, _), _| b != bucket);
        let removed = (before - records.len()) as u64;
        if records.is_empty() {
            namespaces.remove(ns);
        }
        Ok(removed)
    }

    fn namespaces(&self) -> BoxStream<'_, RefResult<NamespaceId>> {
        let mut names: Vec<NamespaceId> = self
            .namespaces
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        stream::iter(names.into_iter().map(Ok)).boxed()
    }

    fn records<'a>(&'a self, ns: &'a NamespaceId) -> BoxStream<'a, RefResult<ObjectRecord>> {
        stream::iter(self.snapshot_records(ns).into_iter().map(Ok)).boxed()
    }
}
