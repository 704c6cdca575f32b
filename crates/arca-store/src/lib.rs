//! Content-addressed blob storage for Arca.
//!
//! Blobs are immutable byte sequences keyed by their BLAKE3 hash, stored per
//! namespace. The rest of the system only sees the [`BlobStore`] capability:
//! put, get, bulk exists, lazy enumeration, and a delete reserved for
//! garbage collection.
//!
//! # Storage Backends
//!
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileSystemBlobStore`] -- one file per blob under a root directory
//!
//! Backends are chosen by [`BlobStoreConfig`] through [`open_blob_store`].
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written; writing identical bytes is a no-op.
//! 2. A put whose bytes do not hash to the claimed id is rejected.
//! 3. Namespaces never share blobs, even for identical content.
//! 4. The store never interprets blob contents.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use config::{open_blob_store, BlobStoreConfig};
pub use error::{StoreError, StoreResult};
pub use fs::FileSystemBlobStore;
pub use memory::InMemoryBlobStore;
pub use traits::BlobStore;
