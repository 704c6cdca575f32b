use std::sync::Arc;

use arca_index::ContentIdStore;
use arca_refs::ObjectService;
use arca_replication::ReplicationLog;
use arca_store::BlobStore;
use arca_types::NamespaceId;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::{Access, Credentials, NamespaceAuthorizer};
use crate::error::{ServerError, ServerResult};
use crate::handler;

/// Shared handles every handler works against.
#[derive(Clone)]
pub struct ServerState {
    pub objects: Arc<ObjectService>,
    pub blobs: Arc<dyn BlobStore>,
    pub content_ids: Arc<dyn ContentIdStore>,
    pub replication: Arc<dyn ReplicationLog>,
    pub authorizer: Arc<dyn NamespaceAuthorizer>,
}

impl ServerState {
    /// Fail with [`ServerError::Forbidden`] unless `credentials` grant
    /// `access` to `namespace`.
    pub async fn require(
        &self,
        credentials: &Credentials,
        namespace: &NamespaceId,
        access: Access,
    ) -> ServerResult<()> {
        if self.authorizer.authorize(credentials, namespace, access).await? {
            Ok(())
        } else {
            Err(ServerError::Forbidden {
                namespace: namespace.clone(),
                access,
            })
        }
    }
}

/// Build the axum router with all Arca endpoints.
pub fn build_router(state: ServerState) -> Router {
    let api = Router::new()
        .route("/health", get(handler::health))
        .route("/blobs/:ns/:id", get(handler::get_blob).put(handler::put_blob))
        .route("/content-id/:ns/:cid", get(handler::get_content_id))
        .route(
            "/content-id/:ns/:cid/update/:blob/:weight",
            put(handler::put_content_id),
        )
        .route("/refs", get(handler::list_namespaces))
        .route("/refs/:ns", delete(handler::drop_namespace))
        .route("/refs/:ns/:bucket", delete(handler::delete_bucket))
        .route(
            "/refs/:ns/:bucket/:key",
            get(handler::get_ref).delete(handler::delete_ref),
        )
        .route("/refs/:ns/:bucket/:key/:hash", put(handler::put_ref))
        .route(
            "/refs/:ns/:bucket/:key/finalize/:hash",
            post(handler::finalize_ref),
        )
        .route("/replication-log/:ns", get(handler::replication_log));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
