use std::io;

/// Errors produced by the replication log.
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// I/O error while writing or recovering the WAL.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias used throughout the replication crate.
pub type ReplicationResult<T> = Result<T, ReplicationError>;
