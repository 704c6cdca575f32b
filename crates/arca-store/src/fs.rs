use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use arca_types::{BlobId, NamespaceId};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{verify_hash, BlobStore};

/// Filesystem blob store: one file per blob.
///
/// On-disk layout:
/// ```text
/// <root>/<namespace>/<first two hex chars>/<full hex id>
/// ```
///
/// Writes land in a dot-prefixed temporary file in the shard directory and
/// are renamed into place, so a reader never observes a partial blob.
/// Concurrent writers of the same blob race harmlessly: both renames install
/// identical bytes.
#[derive(Debug)]
pub struct FileSystemBlobStore {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl FileSystemBlobStore {
    /// Create a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, ns: &NamespaceId) -> PathBuf {
        self.root.join(ns.as_str())
    }

    fn blob_path(&self, ns: &NamespaceId, id: &BlobId) -> PathBuf {
        let hex = id.to_hex();
        self.namespace_dir(ns).join(&hex[..2]).join(hex)
    }
}

async fn path_exists(path: &Path) -> StoreResult<bool> {
    match fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn read_dir_names(dir: &Path) -> StoreResult<Vec<(String, PathBuf)>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push((name, entry.path()));
        }
    }
    names.sort();
    Ok(names)
}

async fn list_blob_ids(ns_dir: &Path) -> StoreResult<Vec<BlobId>> {
    let mut ids = Vec::new();
    for (_, shard) in read_dir_names(ns_dir).await? {
        for (name, path) in read_dir_names(&shard).await? {
            match BlobId::from_hex(&name) {
                Ok(id) => ids.push(id),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unrecognized blob file"),
            }
        }
    }
    Ok(ids)
}

#[async_trait]
impl BlobStore for FileSystemBlobStore {
    async fn put(&self, ns: &NamespaceId, id: &BlobId, data: Bytes) -> StoreResult<BlobId> {
        verify_hash(id, &data)?;
        let path = self.blob_path(ns, id);
        if path_exists(&path).await? {
            debug!(namespace = %ns, blob = %id, "blob already present");
            return Ok(*id);
        }

        let shard = path
            .parent()
            .ok_or_else(|| StoreError::Unavailable(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(shard).await?;

        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = shard.join(format!(".{}.{}.{n}.tmp", id.to_hex(), std::process::id()));
        fs::write(&tmp, &data).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(namespace = %ns, blob = %id, len = data.len(), "blob written");
        Ok(*id)
    }

    async fn get(&self, ns: &NamespaceId, id: &BlobId) -> StoreResult<Bytes> {
        match fs::read(self.blob_path(ns, id)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                namespace: ns.clone(),
                id: *id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, ns: &NamespaceId, ids: &[BlobId]) -> StoreResult<Vec<bool>> {
        let mut present = Vec::with_capacity(ids.len());
        for id in ids {
            present.push(path_exists(&self.blob_path(ns, id)).await?);
        }
        Ok(present)
    }

    fn enumerate<'a>(&'a self, ns: &'a NamespaceId) -> BoxStream<'a, StoreResult<BlobId>> {
        let dir = self.namespace_dir(ns);
        stream::once(async move { list_blob_ids(&dir).await })
            .flat_map(|listing| match listing {
                Ok(ids) => stream::iter(ids.into_iter().map(Ok)).boxed(),
                Err(e) => stream::once(async move { Err(e) }).boxed(),
            })
            .boxed()
    }

    async fn delete(&self, ns: &NamespaceId, id: &BlobId) -> StoreResult<bool> {
        match fs::remove_file(self.blob_path(ns, id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
