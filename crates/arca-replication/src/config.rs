use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ReplicationResult;
use crate::log::{InMemoryReplicationLog, ReplicationLog, WalReplicationLog, DEFAULT_CHANNEL_CAPACITY};
use crate::wal::SyncMode;

/// `[replication]` configuration section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// WAL file location. Without one the log lives in memory only.
    pub wal_path: Option<PathBuf>,
    pub sync_mode: SyncMode,
    /// Buffered entries per subscriber before it lags.
    pub channel_capacity: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            wal_path: None,
            sync_mode: SyncMode::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Build the replication log described by `config`.
pub fn open_replication_log(config: &ReplicationConfig) -> ReplicationResult<Arc<dyn ReplicationLog>> {
    Ok(match &config.wal_path {
        Some(path) => Arc::new(WalReplicationLog::open_with_capacity(
            path,
            config.sync_mode,
            config.channel_capacity,
        )?),
        None => Arc::new(InMemoryReplicationLog::with_capacity(config.channel_capacity)),
    })
}
