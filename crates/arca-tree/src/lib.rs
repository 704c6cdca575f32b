//! Content-addressed directory trees.
//!
//! A directory is a [`DirectoryNode`] of named [`DirectoryEntry`]s. Each
//! entry carries [`EntryFlags`] and the hash of its target: another
//! directory node or a [`FileNode`] of raw bytes. Nodes are serialized
//! canonically (entries in name order), so a tree's root hash depends only
//! on its contents, never on the order it was built in.
//!
//! Serialized nodes live in a [`BlobStore`](arca_store::BlobStore) behind a
//! [`TreeStore`]. Children are read from the store the first time they are
//! accessed, and a node's hash is recomputed only after it, or something
//! below it, changed.

pub mod error;
pub mod flags;
pub mod node;
pub mod store;

pub use error::{TreeError, TreeResult};
pub use flags::EntryFlags;
pub use node::{DirectoryEntry, DirectoryNode, FileNode, TYPE_ID};
pub use store::{DirectoryTree, TreeListing, TreeStore};
