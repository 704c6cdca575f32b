//! Replication log for Arca.
//!
//! Every finalized object (and every explicit delete) is appended to a
//! per-namespace log with a gap-free, strictly increasing sequence number.
//! Replicas tail the log with [`ReplicationLog::read_from`] or subscribe to
//! new entries as they are appended.
//!
//! Two backends exist: [`InMemoryReplicationLog`] for tests and ephemeral
//! nodes, and [`WalReplicationLog`] which frames each entry into an
//! append-only file and rebuilds its state from that file on open.

pub mod config;
pub mod error;
pub mod event;
pub mod log;
pub mod wal;

pub use config::{open_replication_log, ReplicationConfig};
pub use error::{ReplicationError, ReplicationResult};
pub use event::{EventKind, ReplicationLogEntry};
pub use log::{InMemoryReplicationLog, ReplicationLog, WalReplicationLog};
pub use wal::{SyncMode, WriteAheadLog};
