use arca_index::IndexError;
use arca_refs::{RefError, ResolveError};
use arca_store::StoreError;
use arca_types::NamespaceId;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::Access;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{access} access to namespace {namespace} denied")]
    Forbidden { namespace: NamespaceId, access: Access },

    #[error(transparent)]
    Refs(#[from] RefError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("replication error: {0}")]
    Replication(#[from] arca_replication::ReplicationError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::HashMismatch { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn index_status(e: &IndexError) -> StatusCode {
    match e {
        IndexError::ContentIdNotFound { .. } => StatusCode::NOT_FOUND,
        IndexError::Store(e) => store_status(e),
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Refs(e) => match e {
                RefError::NotFound { .. } => StatusCode::NOT_FOUND,
                RefError::ObjectHashMismatch { .. } | RefError::Payload(_) => {
                    StatusCode::BAD_REQUEST
                }
                RefError::Resolve(
                    ResolveError::DepthExceeded { .. } | ResolveError::MalformedAttachment { .. },
                ) => StatusCode::BAD_REQUEST,
                RefError::Store(e) => store_status(e),
                RefError::Index(e) => index_status(e),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Store(e) => store_status(e),
            Self::Index(e) => index_status(e),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
            }
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arca_types::{BlobId, BucketId, RefKey};

    #[test]
    fn status_mapping() {
        let ns = NamespaceId::new("ns").unwrap();
        let missing = ServerError::from(RefError::NotFound {
            namespace: ns.clone(),
            bucket: BucketId::new("b").unwrap(),
            key: RefKey::new("k").unwrap(),
        });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let mismatch = ServerError::from(StoreError::HashMismatch {
            claimed: BlobId::from_hash([1; 32]),
            computed: BlobId::from_hash([2; 32]),
        });
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);

        let denied = ServerError::Forbidden {
            namespace: ns,
            access: Access::Write,
        };
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(denied.to_string(), "write access to namespace ns denied");

        let down = ServerError::from(StoreError::Unavailable("disk".into()));
        assert_eq!(down.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
