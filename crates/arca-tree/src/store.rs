use std::borrow::Cow;
use std::sync::Arc;

use arca_store::BlobStore;
use arca_types::{BlobId, NamespaceId};
use bytes::Bytes;
use tracing::debug;

use crate::error::{TreeError, TreeResult};
use crate::flags::EntryFlags;
use crate::node::{DirectoryNode, FileNode};

/// A blob store bound to the namespace trees are kept in.
#[derive(Clone)]
pub struct TreeStore {
    blobs: Arc<dyn BlobStore>,
    namespace: NamespaceId,
}

impl TreeStore {
    pub fn new(blobs: Arc<dyn BlobStore>, namespace: NamespaceId) -> Self {
        Self { blobs, namespace }
    }

    pub fn namespace(&self) -> &NamespaceId {
        &self.namespace
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Read and parse the directory node stored under `hash`.
    pub async fn read_directory(&self, hash: &BlobId) -> TreeResult<DirectoryNode> {
        let data = self.blobs.get(&self.namespace, hash).await?;
        DirectoryNode::parse(&data)
    }

    pub async fn read_file(&self, hash: &BlobId) -> TreeResult<FileNode> {
        let data = self.blobs.get(&self.namespace, hash).await?;
        Ok(FileNode::new(data))
    }

    pub async fn write_file(&self, file: &FileNode) -> TreeResult<BlobId> {
        self.write_bytes(file.data().clone()).await
    }

    pub(crate) async fn write_node(&self, encoded: Vec<u8>) -> TreeResult<BlobId> {
        self.write_bytes(Bytes::from(encoded)).await
    }

    async fn write_bytes(&self, data: Bytes) -> TreeResult<BlobId> {
        let id = arca_crypto::blob_id(&data);
        let id = self.blobs.put(&self.namespace, &id, data).await?;
        debug!(namespace = %self.namespace, blob = %id.short_hex(), "tree blob written");
        Ok(id)
    }
}

impl std::fmt::Debug for TreeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeStore")
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// One line of a recursive tree listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeListing {
    /// `/`-separated path from the root.
    pub path: String,
    pub flags: EntryFlags,
    /// `None` for directories changed since the last commit.
    pub hash: Option<BlobId>,
}

/// A mutable tree rooted at one directory node.
#[derive(Debug)]
pub struct DirectoryTree {
    store: TreeStore,
    root: DirectoryNode,
}

fn split_path(path: &str) -> TreeResult<(Vec<&str>, &str)> {
    let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let file = parts
        .pop()
        .ok_or_else(|| TreeError::InvalidName(path.to_string()))?;
    Ok((parts, file))
}

impl DirectoryTree {
    /// An empty tree.
    pub fn new(store: TreeStore) -> Self {
        Self {
            store,
            root: DirectoryNode::new(),
        }
    }

    /// The tree whose root node is stored under `hash`.
    pub async fn open(store: TreeStore, hash: &BlobId) -> TreeResult<Self> {
        let root = store.read_directory(hash).await?;
        Ok(Self { store, root })
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub fn root(&self) -> &DirectoryNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut DirectoryNode {
        &mut self.root
    }

    /// Write every changed node and return the root hash.
    pub async fn commit(&mut self) -> TreeResult<BlobId> {
        let hash = self.root.serialize(&self.store).await?;
        debug!(namespace = %self.store.namespace(), root = %hash.short_hex(), "tree committed");
        Ok(hash)
    }

    /// Store `data` at `path`, creating intermediate directories and
    /// replacing an existing file.
    pub async fn insert_file(
        &mut self,
        path: &str,
        data: Bytes,
        flags: EntryFlags,
    ) -> TreeResult<BlobId> {
        let (dirs, file) = split_path(path)?;
        let mut dir = &mut self.root;
        for name in dirs {
            dir = dir.find_or_add_directory(name, &self.store).await?;
        }
        dir.replace_file(file, data, flags)
    }

    /// Create the directory at `path` and any missing parents.
    pub async fn insert_directory(&mut self, path: &str) -> TreeResult<()> {
        let mut dir = &mut self.root;
        for name in path.split('/').filter(|p| !p.is_empty()) {
            dir = dir.find_or_add_directory(name, &self.store).await?;
        }
        Ok(())
    }

    /// Contents of the file at `path`.
    pub async fn read_file(&mut self, path: &str) -> TreeResult<Bytes> {
        let (dirs, file) = split_path(path)?;
        let mut dir = &mut self.root;
        for name in dirs {
            dir = dir
                .find_directory(name, &self.store)
                .await?
                .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        }
        let entry = dir
            .entry_mut(file)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        Ok(entry.file(&self.store).await?.data().clone())
    }

    /// Remove the entry at `path`. Returns `true` if it existed.
    pub async fn remove(&mut self, path: &str) -> TreeResult<bool> {
        let (dirs, last) = split_path(path)?;
        let mut dir = &mut self.root;
        for name in dirs {
            match dir.find_directory(name, &self.store).await? {
                Some(next) => dir = next,
                None => return Ok(false),
            }
        }
        Ok(dir.delete(last))
    }

    /// Every entry below the root, sorted by path. Directories not yet
    /// loaded are read from the store without being kept.
    pub async fn list(&self) -> TreeResult<Vec<TreeListing>> {
        let mut listing = Vec::new();
        let mut pending: Vec<(String, Cow<'_, DirectoryNode>)> =
            vec![(String::new(), Cow::Borrowed(&self.root))];

        while let Some((prefix, dir)) = pending.pop() {
            let mut children = Vec::new();
            for entry in dir.entries() {
                let path = if prefix.is_empty() {
                    entry.name().to_string()
                } else {
                    format!("{prefix}/{}", entry.name())
                };
                listing.push(TreeListing {
                    path: path.clone(),
                    flags: entry.flags(),
                    hash: entry.hash(),
                });
                if !entry.flags().is_directory() {
                    continue;
                }
                let child = match (entry.loaded_directory(), entry.hash()) {
                    (Some(node), _) => Cow::Owned(node.clone()),
                    (None, Some(hash)) => Cow::Owned(self.store.read_directory(&hash).await?),
                    (None, None) => continue,
                };
                children.push((path, child));
            }
            pending.extend(children);
        }

        listing.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arca_store::InMemoryBlobStore;
    use proptest::prelude::*;

    fn store() -> TreeStore {
        TreeStore::new(
            Arc::new(InMemoryBlobStore::new()),
            NamespaceId::new("trees").unwrap(),
        )
    }

    #[tokio::test]
    async fn commit_and_reopen() {
        let store = store();
        let mut tree = DirectoryTree::new(store.clone());
        tree.insert_file("src/main.rs", Bytes::from_static(b"fn main() {}"), EntryFlags::TEXT)
            .await
            .unwrap();
        tree.insert_file("bin/tool", Bytes::from_static(b"\x7fELF"), EntryFlags::EXECUTABLE)
            .await
            .unwrap();
        let root = tree.commit().await.unwrap();

        let mut reopened = DirectoryTree::open(store, &root).await.unwrap();
        assert_eq!(
            reopened.read_file("src/main.rs").await.unwrap().as_ref(),
            b"fn main() {}"
        );
        assert_eq!(reopened.commit().await.unwrap(), root);
    }

    #[tokio::test]
    async fn modification_after_reopen_changes_root() {
        let store = store();
        let mut tree = DirectoryTree::new(store.clone());
        tree.insert_file("a/b/c.txt", Bytes::from_static(b"one"), EntryFlags::empty())
            .await
            .unwrap();
        let first = tree.commit().await.unwrap();

        let mut reopened = DirectoryTree::open(store.clone(), &first).await.unwrap();
        reopened
            .insert_file("a/b/c.txt", Bytes::from_static(b"two"), EntryFlags::empty())
            .await
            .unwrap();
        let second = reopened.commit().await.unwrap();
        assert_ne!(first, second);

        assert!(reopened.remove("a/b/c.txt").await.unwrap());
        assert!(!reopened.remove("a/missing/c.txt").await.unwrap());
        let mut empty_dirs = DirectoryTree::new(store);
        empty_dirs
            .root_mut()
            .add_directory("a")
            .unwrap()
            .add_directory("b")
            .unwrap();
        assert_eq!(
            reopened.commit().await.unwrap(),
            empty_dirs.commit().await.unwrap()
        );
    }

    #[tokio::test]
    async fn list_walks_stored_and_loaded_nodes() {
        let store = store();
        let mut tree = DirectoryTree::new(store.clone());
        tree.insert_file("z.txt", Bytes::from_static(b"z"), EntryFlags::empty())
            .await
            .unwrap();
        tree.insert_file("dir/inner.txt", Bytes::from_static(b"i"), EntryFlags::empty())
            .await
            .unwrap();
        let root = tree.commit().await.unwrap();

        let reopened = DirectoryTree::open(store, &root).await.unwrap();
        let paths: Vec<String> = reopened
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.path)
            .collect();
        assert_eq!(paths, vec!["dir", "dir/inner.txt", "z.txt"]);
        assert_eq!(tree.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn insert_directory_creates_parents() {
        let mut tree = DirectoryTree::new(store());
        tree.insert_directory("a/b/c").await.unwrap();
        tree.insert_directory("a/b").await.unwrap();
        let paths: Vec<String> = tree.list().await.unwrap().into_iter().map(|l| l.path).collect();
        assert_eq!(paths, vec!["a", "a/b", "a/b/c"]);

        tree.insert_file("a/f", Bytes::from_static(b"f"), EntryFlags::empty())
            .await
            .unwrap();
        assert!(matches!(
            tree.insert_directory("a/f/g").await.unwrap_err(),
            TreeError::InvalidAccessor { .. }
        ));
    }

    #[tokio::test]
    async fn missing_file_and_bad_paths() {
        let mut tree = DirectoryTree::new(store());
        assert!(matches!(
            tree.read_file("nope").await.unwrap_err(),
            TreeError::NotFound(_)
        ));
        assert!(matches!(
            tree.insert_file("/", Bytes::new(), EntryFlags::empty())
                .await
                .unwrap_err(),
            TreeError::InvalidName(_)
        ));
    }

    #[tokio::test]
    async fn corrupt_root_is_malformed() {
        let store = store();
        let bogus = Bytes::from_static(b"not a tree");
        let id = arca_crypto::blob_id(&bogus);
        store.blobs().put(store.namespace(), &id, bogus).await.unwrap();
        assert!(matches!(
            DirectoryTree::open(store, &id).await.unwrap_err(),
            TreeError::MalformedTree(_)
        ));
    }

    proptest! {
        #[test]
        fn root_hash_ignores_insertion_order(
            files in proptest::collection::btree_map("[a-z]{1,6}", proptest::collection::vec(any::<u8>(), 0..16), 1..8),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let (forward, backward) = runtime.block_on(async {
                let store = store();
                let mut forward = DirectoryTree::new(store.clone());
                for (name, data) in &files {
                    forward
                        .insert_file(&format!("d/{name}"), Bytes::from(data.clone()), EntryFlags::empty())
                        .await
                        .unwrap();
                }
                let mut backward = DirectoryTree::new(store);
                for (name, data) in files.iter().rev() {
                    backward
                        .insert_file(&format!("d/{name}"), Bytes::from(data.clone()), EntryFlags::empty())
                        .await
                        .unwrap();
                }
                (forward.commit().await.unwrap(), backward.commit().await.unwrap())
            });
            prop_assert_eq!(forward, backward);
        }
    }
}
