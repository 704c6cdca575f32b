use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fs::FileSystemBlobStore;
use crate::memory::InMemoryBlobStore;
use crate::traits::BlobStore;

/// Which blob storage backend to use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BlobStoreConfig {
    /// Keep blobs in process memory. Lost on restart.
    Memory,
    /// Store blobs as files under `root`.
    Filesystem { root: PathBuf },
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

/// Build the configured backend behind the [`BlobStore`] capability.
pub fn open_blob_store(config: &BlobStoreConfig) -> Arc<dyn BlobStore> {
    match config {
        BlobStoreConfig::Memory => Arc::new(InMemoryBlobStore::new()),
        BlobStoreConfig::Filesystem { root } => Arc::new(FileSystemBlobStore::new(root.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_memory() {
        assert_eq!(BlobStoreConfig::default(), BlobStoreConfig::Memory);
    }

    #[test]
    fn parses_filesystem_backend_from_toml() {
        let config: BlobStoreConfig =
            toml::from_str("backend = \"filesystem\"\nroot = \"/var/lib/arca\"").unwrap();
        assert_eq!(
            config,
            BlobStoreConfig::Filesystem {
                root: PathBuf::from("/var/lib/arca")
            }
        );
    }

    #[tokio::test]
    async fn open_selects_backend() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_blob_store(&BlobStoreConfig::Filesystem {
            root: dir.path().to_path_buf(),
        });
        let ns = arca_types::NamespaceId::new("cfg").unwrap();
        let id = arca_crypto::blob_id(b"via config");
        store
            .put(&ns, &id, bytes::Bytes::from_static(b"via config"))
            .await
            .unwrap();
        assert!(dir.path().join("cfg").exists());
    }
}
