//! `[gc]` configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcSettings {
    /// Whether the periodic sweep runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Sweep interval. Zero disables scheduling.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Unfinalized records older than this are removed.
    #[serde(default = "default_max_unfinalized_age")]
    pub max_unfinalized_age_secs: u64,

    /// Also reclaim unreferenced blobs.
    #[serde(default = "default_enabled")]
    pub blob_cleanup: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    900
}

fn default_max_unfinalized_age() -> u64 {
    24 * 3600
}

impl Default for GcSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            max_unfinalized_age_secs: default_max_unfinalized_age(),
            blob_cleanup: default_enabled(),
        }
    }
}

impl GcSettings {
    /// Sweep period, or `None` if sweeps should not be scheduled.
    pub fn interval(&self) -> Option<Duration> {
        if !self.enabled || self.interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.interval_secs))
        }
    }

    pub fn max_unfinalized_age(&self) -> chrono::Duration {
        let secs = self.max_unfinalized_age_secs.min(i64::MAX as u64 / 1000);
        chrono::Duration::seconds(secs as i64)
    }
}
