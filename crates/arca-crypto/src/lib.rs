//! Content hashing for Arca.
//!
//! All identifiers in Arca are BLAKE3 hashes. The [`ContentHasher`] prepends
//! a domain tag so that a blob hash and a content-id derivation over the
//! same bytes never collide.

pub mod hasher;

pub use hasher::ContentHasher;

use arca_types::{BlobId, ContentId};

/// Compute the [`BlobId`] of a byte sequence.
pub fn blob_id(data: &[u8]) -> BlobId {
    ContentHasher::BLOB.hash(data)
}

/// Derive a [`ContentId`] from uncompressed content.
pub fn content_id(data: &[u8]) -> ContentId {
    ContentId::from_hash(*ContentHasher::CONTENT.hash(data).as_bytes())
}
