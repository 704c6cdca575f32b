use serde::{Deserialize, Serialize};

use crate::resolver::DEFAULT_MAX_DEPTH;

/// `[references]` configuration section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencesConfig {
    /// Payloads up to this many bytes are also kept inline in the record.
    pub max_inline_payload_size: usize,
    /// Maximum nesting of attached objects during resolution.
    pub max_resolve_depth: usize,
}

impl Default for ReferencesConfig {
    fn default() -> Self {
        Self {
            max_inline_payload_size: 64 * 1024,
            max_resolve_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
