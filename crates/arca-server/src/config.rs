use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use arca_gc::GcSettings;
use arca_refs::ReferencesConfig;
use arca_replication::ReplicationConfig;
use arca_store::BlobStoreConfig;
use arca_types::NamespaceId;
use serde::{Deserialize, Serialize};

use crate::auth::Access;
use crate::error::{ServerError, ServerResult};

/// Everything needed to start a server, usually read from a TOML file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub blob_store: BlobStoreConfig,
    pub replication: ReplicationConfig,
    pub references: ReferencesConfig,
    pub gc: GcSettings,
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 57001)),
            blob_store: BlobStoreConfig::default(),
            replication: ReplicationConfig::default(),
            references: ReferencesConfig::default(),
            gc: GcSettings::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read a TOML configuration file. Missing keys take their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Give unauthenticated callers full access.
    pub allow_anonymous: bool,
    pub tokens: Vec<TokenGrant>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allow_anonymous: true,
            tokens: Vec::new(),
        }
    }
}

/// One bearer token and what it may do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    /// Namespace names, or `"*"` for all.
    pub namespaces: Vec<String>,
    pub access: Access,
}

impl TokenGrant {
    pub fn covers(&self, namespace: &NamespaceId) -> bool {
        self.namespaces
            .iter()
            .any(|n| n == "*" || n == namespace.as_str())
    }
}
