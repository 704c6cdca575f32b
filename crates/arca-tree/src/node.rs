use std::collections::btree_map::{self, BTreeMap};

use arca_types::hash::HASH_LEN;
use arca_types::BlobId;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};

use crate::error::{TreeError, TreeResult};
use crate::flags::EntryFlags;
use crate::store::TreeStore;

/// Signature byte of a serialized directory node.
pub const TYPE_ID: u8 = b'd';

/// Leaf content of a file entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileNode {
    data: Bytes,
}

impl FileNode {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn id(&self) -> BlobId {
        arca_crypto::blob_id(&self.data)
    }
}

#[derive(Clone, Debug)]
enum Child {
    Directory(Box<DirectoryNode>),
    File(FileNode),
}

/// A named entry of a directory.
///
/// An entry parsed from storage only knows its target's hash; the target
/// is read on first access through [`directory`](Self::directory) or
/// [`file`](Self::file) and owned by the entry from then on.
#[derive(Clone, Debug)]
pub struct DirectoryEntry {
    name: String,
    flags: EntryFlags,
    hash: Option<BlobId>,
    node: Option<Child>,
}

impl DirectoryEntry {
    fn stored(name: String, flags: EntryFlags, hash: BlobId) -> Self {
        Self {
            name,
            flags,
            hash: Some(hash),
            node: None,
        }
    }

    fn new_directory(name: String) -> Self {
        Self {
            name,
            flags: EntryFlags::DIRECTORY,
            hash: None,
            node: Some(Child::Directory(Box::default())),
        }
    }

    fn new_file(name: String, flags: EntryFlags, file: FileNode) -> Self {
        Self {
            name,
            flags: flags | EntryFlags::FILE,
            hash: Some(file.id()),
            node: Some(Child::File(file)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> EntryFlags {
        self.flags
    }

    /// Hash of the target as of the last serialization or parse. `None`
    /// for a directory added since.
    pub fn hash(&self) -> Option<BlobId> {
        self.hash
    }

    pub fn is_materialized(&self) -> bool {
        self.node.is_some()
    }

    pub(crate) fn loaded_directory(&self) -> Option<&DirectoryNode> {
        match &self.node {
            Some(Child::Directory(dir)) => Some(&**dir),
            _ => None,
        }
    }

    fn wrong_kind(&self, expected: &'static str) -> TreeError {
        TreeError::InvalidAccessor {
            name: self.name.clone(),
            flags: self.flags,
            expected,
        }
    }

    fn stored_hash(&self) -> TreeResult<BlobId> {
        self.hash
            .ok_or_else(|| TreeError::MalformedTree(format!("entry {} has no hash", self.name)))
    }

    fn as_directory_mut(&mut self) -> TreeResult<&mut DirectoryNode> {
        if !matches!(self.node, Some(Child::Directory(_))) {
            return Err(self.wrong_kind("directory"));
        }
        match &mut self.node {
            Some(Child::Directory(dir)) => Ok(&mut **dir),
            _ => unreachable!(),
        }
    }

    /// The directory this entry names, read from `store` on first access.
    pub async fn directory(&mut self, store: &TreeStore) -> TreeResult<&mut DirectoryNode> {
        if !self.flags.is_directory() {
            return Err(self.wrong_kind("directory"));
        }
        if self.node.is_none() {
            let node = store.read_directory(&self.stored_hash()?).await?;
            self.node = Some(Child::Directory(Box::new(node)));
        }
        self.as_directory_mut()
    }

    /// The file this entry names, read from `store` on first access.
    pub async fn file(&mut self, store: &TreeStore) -> TreeResult<&FileNode> {
        if !self.flags.is_file() {
            return Err(self.wrong_kind("file"));
        }
        if self.node.is_none() {
            let file = store.read_file(&self.stored_hash()?).await?;
            self.node = Some(Child::File(file));
        }
        match &self.node {
            Some(Child::File(file)) => Ok(file),
            _ => Err(self.wrong_kind("file")),
        }
    }
}

/// A directory: entries keyed and ordered by name.
#[derive(Clone, Debug, Default)]
pub struct DirectoryNode {
    entries: BTreeMap<String, DirectoryEntry>,
    /// Hash of the last serialization; cleared by any change.
    hash: Option<BlobId>,
}

fn validate_name(name: &str) -> TreeResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl DirectoryNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, name: &str) -> Option<&DirectoryEntry> {
        self.entries.get(name)
    }

    /// Mutable access for lazy materialization. Changes made through the
    /// returned entry's children are picked up by the next serialization.
    pub fn entry_mut(&mut self, name: &str) -> Option<&mut DirectoryEntry> {
        self.entries.get_mut(name)
    }

    /// Entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries.values()
    }

    /// Hash from the last serialization, if nothing changed since.
    pub fn cached_hash(&self) -> Option<BlobId> {
        if self.is_dirty() {
            None
        } else {
            self.hash
        }
    }

    /// Whether this node or any materialized descendant changed since its
    /// last serialization.
    pub fn is_dirty(&self) -> bool {
        self.hash.is_none()
            || self.entries.values().any(|entry| match &entry.node {
                Some(Child::Directory(dir)) => dir.is_dirty(),
                _ => false,
            })
    }

    /// Add an empty subdirectory.
    pub fn add_directory(&mut self, name: &str) -> TreeResult<&mut DirectoryNode> {
        validate_name(name)?;
        match self.entries.entry(name.to_string()) {
            btree_map::Entry::Occupied(_) => Err(TreeError::DuplicateEntry(name.to_string())),
            btree_map::Entry::Vacant(slot) => {
                self.hash = None;
                slot.insert(DirectoryEntry::new_directory(name.to_string()))
                    .as_directory_mut()
            }
        }
    }

    /// Add a file. `flags` may add modifiers such as
    /// [`EntryFlags::EXECUTABLE`]; the file flag is always set. Returns the
    /// file's content hash.
    pub fn add_file(&mut self, name: &str, data: Bytes, flags: EntryFlags) -> TreeResult<BlobId> {
        validate_name(name)?;
        match self.entries.entry(name.to_string()) {
            btree_map::Entry::Occupied(_) => Err(TreeError::DuplicateEntry(name.to_string())),
            btree_map::Entry::Vacant(slot) => {
                self.hash = None;
                let file = FileNode::new(data);
                let id = file.id();
                slot.insert(DirectoryEntry::new_file(name.to_string(), flags, file));
                Ok(id)
            }
        }
    }

    /// Add a file, replacing any existing file of the same name. Replacing
    /// a directory is refused.
    pub fn replace_file(&mut self, name: &str, data: Bytes, flags: EntryFlags) -> TreeResult<BlobId> {
        validate_name(name)?;
        if let Some(existing) = self.entries.get(name) {
            if existing.flags.is_directory() {
                return Err(existing.wrong_kind("file"));
            }
        }
        let file = FileNode::new(data);
        let id = file.id();
        self.entries
            .insert(name.to_string(), DirectoryEntry::new_file(name.to_string(), flags, file));
        self.hash = None;
        Ok(id)
    }

    /// Remove an entry. Returns `true` if it existed.
    pub fn delete(&mut self, name: &str) -> bool {
        let removed = self.entries.remove(name).is_some();
        if removed {
            self.hash = None;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hash = None;
    }

    /// The subdirectory named `name`, or `None` if there is no such entry.
    pub async fn find_directory(
        &mut self,
        name: &str,
        store: &TreeStore,
    ) -> TreeResult<Option<&mut DirectoryNode>> {
        match self.entries.get_mut(name) {
            Some(entry) => entry.directory(store).await.map(Some),
            None => Ok(None),
        }
    }

    /// The subdirectory named `name`, created empty if absent.
    pub async fn find_or_add_directory(
        &mut self,
        name: &str,
        store: &TreeStore,
    ) -> TreeResult<&mut DirectoryNode> {
        validate_name(name)?;
        match self.entries.entry(name.to_string()) {
            btree_map::Entry::Occupied(slot) => slot.into_mut().directory(store).await,
            btree_map::Entry::Vacant(slot) => {
                self.hash = None;
                slot.insert(DirectoryEntry::new_directory(name.to_string()))
                    .as_directory_mut()
            }
        }
    }

    /// Write this node, and every changed descendant, to `store`. Returns
    /// the node's hash. Unchanged subtrees are not rewritten.
    pub fn serialize<'a>(&'a mut self, store: &'a TreeStore) -> BoxFuture<'a, TreeResult<BlobId>> {
        async move {
            if let Some(hash) = self.cached_hash() {
                return Ok(hash);
            }
            for entry in self.entries.values_mut() {
                match &mut entry.node {
                    Some(Child::Directory(dir)) => entry.hash = Some(dir.serialize(store).await?),
                    Some(Child::File(file)) => entry.hash = Some(store.write_file(file).await?),
                    None => {}
                }
            }
            let hash = store.write_node(self.encode()?).await?;
            self.hash = Some(hash);
            Ok(hash)
        }
        .boxed()
    }

    /// Canonical bytes: the signature, then per entry in name order the
    /// flags byte, the UTF-8 name, a zero byte and the 32-byte target hash.
    /// Every entry must have a hash.
    pub fn encode(&self) -> TreeResult<Vec<u8>> {
        let size = 1 + self
            .entries
            .values()
            .map(|e| 1 + e.name.len() + 1 + HASH_LEN)
            .sum::<usize>();
        let mut out = Vec::with_capacity(size);
        out.push(TYPE_ID);
        for entry in self.entries.values() {
            let hash = entry.stored_hash()?;
            out.push(entry.flags.bits());
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(hash.as_bytes());
        }
        Ok(out)
    }

    /// Parse canonical bytes. Children stay unread until accessed.
    pub fn parse(data: &[u8]) -> TreeResult<Self> {
        let (&signature, mut rest) = data
            .split_first()
            .ok_or_else(|| TreeError::MalformedTree("empty node".into()))?;
        if signature != TYPE_ID {
            return Err(TreeError::MalformedTree(format!(
                "invalid signature byte {signature:#04x} for directory"
            )));
        }

        let mut entries: BTreeMap<String, DirectoryEntry> = BTreeMap::new();
        while let Some((&flags, after_flags)) = rest.split_first() {
            let name_len = after_flags
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| TreeError::MalformedTree("unterminated entry name".into()))?;
            let name = std::str::from_utf8(&after_flags[..name_len])
                .map_err(|_| TreeError::MalformedTree("entry name is not UTF-8".into()))?;
            validate_name(name)
                .map_err(|_| TreeError::MalformedTree(format!("invalid entry name {name:?}")))?;

            let after_name = &after_flags[name_len + 1..];
            if after_name.len() < HASH_LEN {
                return Err(TreeError::MalformedTree(format!("truncated hash for entry {name}")));
            }
            let (hash_bytes, tail) = after_name.split_at(HASH_LEN);
            let mut hash = [0u8; HASH_LEN];
            hash.copy_from_slice(hash_bytes);

            // Canonical order also rules out duplicates.
            if let Some((last, _)) = entries.last_key_value() {
                if last.as_str() >= name {
                    return Err(TreeError::MalformedTree(format!("entry {name} out of order")));
                }
            }
            entries.insert(
                name.to_string(),
                DirectoryEntry::stored(
                    name.to_string(),
                    EntryFlags::from_bits(flags),
                    BlobId::from_hash(hash),
                ),
            );
            rest = tail;
        }

        Ok(Self {
            entries,
            hash: Some(arca_crypto::blob_id(data)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arca_store::InMemoryBlobStore;
    use arca_types::NamespaceId;
    use std::sync::Arc;

    fn store() -> TreeStore {
        TreeStore::new(
            Arc::new(InMemoryBlobStore::new()),
            NamespaceId::new("trees").unwrap(),
        )
    }

    #[tokio::test]
    async fn insertion_order_does_not_change_hash() {
        let store = store();

        let mut first = DirectoryNode::new();
        first
            .add_file("a.txt", Bytes::from_static(b"hello"), EntryFlags::TEXT)
            .unwrap();
        first.add_directory("sub").unwrap();

        let mut second = DirectoryNode::new();
        second.add_directory("sub").unwrap();
        second
            .add_file("a.txt", Bytes::from_static(b"hello"), EntryFlags::TEXT)
            .unwrap();

        let h1 = first.serialize(&store).await.unwrap();
        let h2 = second.serialize(&store).await.unwrap();
        assert_eq!(h1, h2);

        let reread = store.read_directory(&h1).await.unwrap();
        let names: Vec<&str> = reread.entries().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a.txt", "sub"]);
        assert_eq!(
            reread.entry("a.txt").unwrap().flags(),
            EntryFlags::FILE | EntryFlags::TEXT
        );
        assert!(reread.entry("sub").unwrap().flags().is_directory());
    }

    #[tokio::test]
    async fn encoding_matches_layout() {
        let store = store();
        let mut node = DirectoryNode::new();
        let file_id = node
            .add_file("x", Bytes::from_static(b"data"), EntryFlags::empty())
            .unwrap();
        node.serialize(&store).await.unwrap();

        let bytes = node.encode().unwrap();
        let mut expected = vec![b'd', EntryFlags::FILE.bits(), b'x', 0];
        expected.extend_from_slice(file_id.as_bytes());
        assert_eq!(bytes, expected);
    }

    #[tokio::test]
    async fn lazy_children_roundtrip_through_store() {
        let store = store();
        let mut root = DirectoryNode::new();
        let sub = root.add_directory("sub").unwrap();
        sub.add_file("inner.bin", Bytes::from_static(b"\x00\x01"), EntryFlags::READ_ONLY)
            .unwrap();
        let hash = root.serialize(&store).await.unwrap();

        let mut reread = store.read_directory(&hash).await.unwrap();
        assert!(!reread.entry("sub").unwrap().is_materialized());
        let sub = reread.find_directory("sub", &store).await.unwrap().unwrap();
        let file = sub
            .entry_mut("inner.bin")
            .unwrap()
            .file(&store)
            .await
            .unwrap();
        assert_eq!(file.data().as_ref(), b"\x00\x01");

        // Unchanged after materialization.
        assert_eq!(reread.serialize(&store).await.unwrap(), hash);
    }

    #[tokio::test]
    async fn nested_change_invalidates_ancestors() {
        let store = store();
        let mut root = DirectoryNode::new();
        root.add_directory("sub").unwrap();
        let before = root.serialize(&store).await.unwrap();
        assert!(!root.is_dirty());

        let sub = root.find_directory("sub", &store).await.unwrap().unwrap();
        sub.add_file("new", Bytes::from_static(b"!"), EntryFlags::empty())
            .unwrap();
        assert!(root.is_dirty());
        assert_ne!(root.serialize(&store).await.unwrap(), before);

        root.find_directory("sub", &store)
            .await
            .unwrap()
            .unwrap()
            .delete("new");
        assert_eq!(root.serialize(&store).await.unwrap(), before);
    }

    #[tokio::test]
    async fn accessors_check_flags() {
        let store = store();
        let mut root = DirectoryNode::new();
        root.add_file("f", Bytes::from_static(b"f"), EntryFlags::empty())
            .unwrap();
        root.add_directory("d").unwrap();

        let err = root.entry_mut("f").unwrap().directory(&store).await.unwrap_err();
        assert!(matches!(err, TreeError::InvalidAccessor { expected: "directory", .. }));
        let err = root.entry_mut("d").unwrap().file(&store).await.unwrap_err();
        assert!(matches!(err, TreeError::InvalidAccessor { expected: "file", .. }));
        assert!(matches!(
            root.find_or_add_directory("f", &store).await.unwrap_err(),
            TreeError::InvalidAccessor { .. }
        ));
    }

    #[tokio::test]
    async fn find_or_add_creates_once() {
        let store = store();
        let mut root = DirectoryNode::new();
        root.find_or_add_directory("a", &store)
            .await
            .unwrap()
            .add_file("x", Bytes::from_static(b"x"), EntryFlags::empty())
            .unwrap();
        let a = root.find_or_add_directory("a", &store).await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(root.len(), 1);
        assert!(root.find_directory("missing", &store).await.unwrap().is_none());
    }

    #[test]
    fn duplicate_and_invalid_names_are_rejected() {
        let mut root = DirectoryNode::new();
        root.add_directory("a").unwrap();
        assert!(matches!(
            root.add_directory("a").unwrap_err(),
            TreeError::DuplicateEntry(name) if name == "a"
        ));
        assert!(matches!(
            root.add_file("a", Bytes::new(), EntryFlags::empty()).unwrap_err(),
            TreeError::DuplicateEntry(_)
        ));
        for bad in ["", ".", "..", "a/b", "nul\0"] {
            assert!(matches!(
                root.add_directory(bad).unwrap_err(),
                TreeError::InvalidName(_)
            ));
        }
    }

    #[test]
    fn replace_file_overwrites_files_only() {
        let mut root = DirectoryNode::new();
        let first = root
            .add_file("f", Bytes::from_static(b"1"), EntryFlags::empty())
            .unwrap();
        let second = root
            .replace_file("f", Bytes::from_static(b"2"), EntryFlags::EXECUTABLE)
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(root.entry("f").unwrap().hash(), Some(second));
        assert!(root.entry("f").unwrap().flags().contains(EntryFlags::EXECUTABLE));

        root.add_directory("d").unwrap();
        assert!(matches!(
            root.replace_file("d", Bytes::new(), EntryFlags::empty()).unwrap_err(),
            TreeError::InvalidAccessor { .. }
        ));
    }

    #[test]
    fn delete_and_clear() {
        let mut root = DirectoryNode::new();
        root.add_directory("a").unwrap();
        root.add_directory("b").unwrap();
        assert!(root.delete("a"));
        assert!(!root.delete("a"));
        root.clear();
        assert!(root.is_empty());
        assert!(root.is_dirty());
    }

    #[test]
    fn parse_rejects_malformed_data() {
        assert!(matches!(DirectoryNode::parse(&[]), Err(TreeError::MalformedTree(_))));
        assert!(matches!(DirectoryNode::parse(b"x"), Err(TreeError::MalformedTree(_))));
        // Name without terminator.
        assert!(matches!(
            DirectoryNode::parse(&[b'd', 2, b'a', b'b']),
            Err(TreeError::MalformedTree(_))
        ));
        // Entries out of name order.
        let mut unordered = vec![b'd'];
        for name in [b'b', b'a'] {
            unordered.extend_from_slice(&[2, name, 0]);
            unordered.extend_from_slice(&[7u8; HASH_LEN]);
        }
        assert!(matches!(
            DirectoryNode::parse(&unordered),
            Err(TreeError::MalformedTree(_))
        ));
        // Hash cut short.
        let mut truncated = vec![b'd', 2, b'a', 0];
        truncated.extend_from_slice(&[7u8; 10]);
        assert!(matches!(
            DirectoryNode::parse(&truncated),
            Err(TreeError::MalformedTree(_))
        ));
    }

    #[test]
    fn parse_rejects_unsafe_entry_names() {
        for name in [&b"."[..], b"..", b"a/b", b"../etc"] {
            let mut data = vec![b'd', 2];
            data.extend_from_slice(name);
            data.push(0);
            data.extend_from_slice(&[7u8; HASH_LEN]);
            assert!(
                matches!(DirectoryNode::parse(&data), Err(TreeError::MalformedTree(_))),
                "accepted {:?}",
                String::from_utf8_lossy(name)
            );
        }
        // Empty name: the terminator comes straight after the flags.
        let mut data = vec![b'd', 2, 0];
        data.extend_from_slice(&[7u8; HASH_LEN]);
        assert!(matches!(DirectoryNode::parse(&data), Err(TreeError::MalformedTree(_))));
    }

    #[test]
    fn parse_empty_directory() {
        let node = DirectoryNode::parse(&[TYPE_ID]).unwrap();
        assert!(node.is_empty());
        assert_eq!(node.cached_hash(), Some(arca_crypto::blob_id(&[TYPE_ID])));
    }
}
