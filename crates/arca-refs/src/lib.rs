//! Reference records for Arca.
//!
//! A reference record names an object by `(namespace, bucket, key)` and
//! points at the blob holding its payload [`Document`]. Payloads may attach
//! other content, either by [`ContentId`](arca_types::ContentId) alias or
//! directly by blob, and attached objects may attach further content.
//!
//! A record is *finalized* once every blob reachable from its payload is
//! present in the blob store. [`ObjectService`] drives that state machine:
//! it stores the record, resolves the payload's references, reports what
//! is still missing, and finalizes (emitting a replication event) once
//! nothing is.
//!
//! # Modules
//!
//! - [`payload`]: the payload [`Document`] model and its [`DocumentVisitor`]
//! - [`resolver`]: [`ReferenceResolver`], the transitive attachment walk
//! - [`record`]: [`ObjectRecord`] and [`FieldSelection`]
//! - [`traits`]: the [`ReferencesStore`] storage interface
//! - [`memory`]: [`InMemoryReferencesStore`]
//! - [`service`]: [`ObjectService`] and [`PutOutcome`]

pub mod config;
pub mod error;
pub mod memory;
pub mod payload;
pub mod record;
pub mod resolver;
pub mod service;
pub mod traits;

pub use config::ReferencesConfig;
pub use error::{PayloadError, RefError, RefResult, ResolveError, ResolveResult};
pub use memory::InMemoryReferencesStore;
pub use payload::{Attachment, Document, DocumentVisitor, Field, FieldValue, MAX_NESTING_DEPTH};
pub use record::{FieldSelection, ObjectRecord};
pub use resolver::{ReferenceResolver, DEFAULT_MAX_DEPTH};
pub use service::{ObjectService, PutOutcome};
pub use traits::ReferencesStore;
