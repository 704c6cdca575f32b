use std::future::Future;
use std::sync::Arc;

use arca_gc::{AlwaysLeader, BlobCleanup, GcService, LeaderElection, RefCleanup};
use arca_index::{BlobIndex, ContentIdStore, InMemoryBlobIndex, InMemoryContentIdStore};
use arca_refs::{InMemoryReferencesStore, ObjectService, ReferencesStore};
use arca_replication::open_replication_log;
use arca_store::open_blob_store;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::auth::{NamespaceAuthorizer, TokenAuthorizer};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::{build_router, ServerState};

/// Arca cache server: the HTTP API plus the background collector.
pub struct ArcaServer {
    config: ServerConfig,
    state: ServerState,
    gc: Arc<GcService>,
}

impl ArcaServer {
    /// Assemble the configured stores. This instance always leads GC.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        Self::with_leader(config, Arc::new(AlwaysLeader))
    }

    pub fn with_leader(config: ServerConfig, leader: Arc<dyn LeaderElection>) -> ServerResult<Self> {
        let blobs = open_blob_store(&config.blob_store);
        let content_ids: Arc<dyn ContentIdStore> =
            Arc::new(InMemoryContentIdStore::new(blobs.clone()));
        let blob_index: Arc<dyn BlobIndex> = Arc::new(InMemoryBlobIndex::new());
        let refs: Arc<dyn ReferencesStore> = Arc::new(InMemoryReferencesStore::new());
        let replication = open_replication_log(&config.replication)?;

        let objects = Arc::new(ObjectService::new(
            refs.clone(),
            blobs.clone(),
            content_ids.clone(),
            blob_index.clone(),
            replication.clone(),
            config.references.clone(),
        ));
        let gc = Arc::new(GcService::new(
            config.gc.clone(),
            leader,
            refs.clone(),
            RefCleanup::new(
                refs.clone(),
                blob_index.clone(),
                content_ids.clone(),
                config.gc.max_unfinalized_age(),
            ),
            BlobCleanup::new(blobs.clone(), blob_index, content_ids.clone(), refs),
        ));
        let authorizer: Arc<dyn NamespaceAuthorizer> =
            Arc::new(TokenAuthorizer::from_config(&config.auth));

        let state = ServerState {
            objects,
            blobs,
            content_ids,
            replication,
            authorizer,
        };
        Ok(Self { config, state, gc })
    }

    /// Replace the authorizer built from the `[auth]` section.
    pub fn with_authorizer(mut self, authorizer: Arc<dyn NamespaceAuthorizer>) -> Self {
        self.state.authorizer = authorizer;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn gc(&self) -> &Arc<GcService> {
        &self.gc
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Serve until `shutdown` completes, then stop the collector and wait
    /// for it to finish its current namespace.
    pub async fn serve_until<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "arca server listening");

        let (stop_gc, gc_signal) = watch::channel(false);
        let gc = self.gc.clone();
        let collector = tokio::spawn(async move { gc.run(gc_signal).await });

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        let _ = stop_gc.send(true);
        if let Err(e) = collector.await {
            tracing::error!(error = %e, "garbage collector task failed");
        }
        info!("arca server stopped");
        served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arca_gc::SweepOutcome;

    #[test]
    fn server_construction() {
        let server = ArcaServer::new(ServerConfig::default()).unwrap();
        assert_eq!(server.config().bind_addr.port(), 57001);
        let _router = server.router();
    }

    #[test]
    fn wal_backed_replication_is_opened() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.replication.wal_path = Some(dir.path().join("replication.wal"));
        ArcaServer::new(config).unwrap();
        assert!(dir.path().join("replication.wal").exists());
    }

    #[tokio::test]
    async fn gc_sweeps_through_server_stack() {
        let server = ArcaServer::new(ServerConfig::default()).unwrap();
        let (_tx, rx) = watch::channel(false);
        let outcome = server.gc().sweep(&rx).await.unwrap();
        assert!(matches!(outcome, SweepOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let mut config = ServerConfig::default();
        config.bind_addr = "127.0.0.1:0".parse().unwrap();
        let server = ArcaServer::new(config).unwrap();
        server.serve_until(async {}).await.unwrap();
    }
}
