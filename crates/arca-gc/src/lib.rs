//! Garbage collection for Arca.
//!
//! [`GcService`] periodically walks every namespace and runs two sweeps:
//!
//! - [`RefCleanup`] removes reference records that never finalized within
//!   the configured age, and records the blob index no longer knows about.
//! - [`BlobCleanup`] removes blobs whose every indexed referrer is gone and
//!   which no content id aliases.
//!
//! Several server instances may run the service against shared storage;
//! only the instance that [`LeaderElection`] names as leader mutates
//! anything.

pub mod blob_cleanup;
pub mod config;
pub mod error;
pub mod leader;
pub mod ref_cleanup;
pub mod service;

pub use blob_cleanup::BlobCleanup;
pub use config::GcSettings;
pub use error::{GcError, GcResult};
pub use leader::{AlwaysLeader, LeaderElection, StaticLeader};
pub use ref_cleanup::RefCleanup;
pub use service::{GcService, NamespaceFailure, SkipReason, SweepOutcome, SweepReport};
