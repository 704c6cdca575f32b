//! Secondary indices over the Arca blob store.
//!
//! - [`BlobIndex`] records which (bucket, key) references each blob. It is
//!   additive and best-effort: it may lag behind true reachability and is
//!   never the source of truth for blob existence.
//! - [`ContentIdStore`] maps namespace-scoped [`ContentId`] aliases to
//!   weighted blob candidates.
//!
//! Both indices are eventually consistent with the blob store and tolerate
//! entries that point at blobs which have already been reclaimed.
//!
//! [`ContentId`]: arca_types::ContentId

pub mod blob_index;
pub mod content_id;
pub mod error;

pub use blob_index::{BlobIndex, InMemoryBlobIndex, RefLocator};
pub use content_id::{ContentIdCandidate, ContentIdStore, InMemoryContentIdStore};
pub use error::{IndexError, IndexResult};
