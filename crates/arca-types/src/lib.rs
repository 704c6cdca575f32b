//! Foundation types for Arca.
//!
//! Every other Arca crate depends on `arca-types`. The types here carry no
//! storage behavior; they only name things.
//!
//! # Key Types
//!
//! - [`NamespaceId`]: top-level isolation unit; nothing is shared across namespaces
//! - [`BucketId`]: named partition of keys within a namespace
//! - [`RefKey`]: opaque key unique within a (namespace, bucket)
//! - [`BlobId`]: deterministic BLAKE3 content hash of immutable bytes
//! - [`ContentId`]: namespace-scoped alias resolving to weighted blobs

pub mod error;
pub mod hash;
pub mod names;

pub use error::TypeError;
pub use hash::{BlobId, ContentId};
pub use names::{BucketId, NamespaceId, RefKey};
