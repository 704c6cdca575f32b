//! HTTP server for Arca.
//!
//! Exposes the blob store, content id aliases, reference records and the
//! replication log over JSON endpoints under `/api/v1`. Every request is
//! checked against a [`NamespaceAuthorizer`] before it reaches the core.
//! [`ArcaServer`] also runs the garbage collector alongside the listener.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use auth::{Access, AllowAllAuthorizer, Credentials, NamespaceAuthorizer, TokenAuthorizer};
pub use config::{AuthConfig, ServerConfig, TokenGrant};
pub use error::{ServerError, ServerResult};
pub use router::{build_router, ServerState};
pub use server::ArcaServer;

#[cfg(test)]
mod tests {
    use super::*;
    use arca_refs::{Document, FieldValue};
    use arca_types::BlobId;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::util::ServiceExt;

    fn app() -> Router {
        ArcaServer::new(ServerConfig::default()).unwrap().router()
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
        call_as(app, method, uri, body, None).await
    }

    async fn call_as(
        app: &Router,
        method: Method,
        uri: &str,
        body: Vec<u8>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn hex(id: &BlobId) -> String {
        id.to_hex()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, body) = call(&app(), Method::GET, "/api/v1/health", vec![]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn blob_upload_and_download() {
        let app = app();
        let data = b"artifact bytes".to_vec();
        let id = arca_crypto::blob_id(&data);
        let uri = format!("/api/v1/blobs/builds/{}", hex(&id));

        let (status, body) = call(&app, Method::PUT, &uri, data.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["identifier"], hex(&id));

        let response = app
            .clone()
            .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn wrong_blob_hash_is_bad_request() {
        let app = app();
        let other = arca_crypto::blob_id(b"other");
        let uri = format!("/api/v1/blobs/builds/{}", hex(&other));
        let (status, body) = call(&app, Method::PUT, &uri, b"data".to_vec()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 400);
    }

    #[tokio::test]
    async fn missing_blob_and_ref_are_not_found() {
        let app = app();
        let id = arca_crypto::blob_id(b"absent");
        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/api/v1/blobs/builds/{}", hex(&id)),
            vec![],
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::GET, "/api/v1/refs/builds/b/k", vec![]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, Method::DELETE, "/api/v1/refs/builds/b/k", vec![]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_namespace_is_rejected() {
        let (status, _) = call(&app(), Method::GET, "/api/v1/refs/Bad%20NS/b/k", vec![]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_reference_flow() {
        let app = app();
        let artifact = b"compiled output".to_vec();
        let x = arca_crypto::blob_id(&artifact);
        let cid = arca_crypto::content_id(b"logical artifact");

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/api/v1/content-id/builds/{cid}/update/{}/10", hex(&x)),
            vec![],
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let payload = Document::new()
            .with("artifact", FieldValue::BinaryAttachment(cid))
            .encode()
            .unwrap();
        let hash = arca_crypto::blob_id(&payload);
        let ref_uri = "/api/v1/refs/builds/bucket/key";

        let (status, outcome) = call(
            &app,
            Method::PUT,
            &format!("{ref_uri}/{}", hex(&hash)),
            payload.clone(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["missing_blobs"], serde_json::json!([hex(&x)]));

        let (_, record) = call(&app, Method::GET, ref_uri, vec![]).await;
        assert_eq!(record["finalized"], false);
        assert_eq!(record["payload"], ::hex::encode(&payload));

        call(
            &app,
            Method::PUT,
            &format!("/api/v1/blobs/builds/{}", hex(&x)),
            artifact,
        )
        .await;
        let (status, outcome) = call(
            &app,
            Method::POST,
            &format!("{ref_uri}/finalize/{}", hex(&hash)),
            vec![],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["missing_blobs"], serde_json::json!([]));
        assert_eq!(outcome["missing_content_ids"], serde_json::json!([]));

        let (_, record) = call(&app, Method::GET, &format!("{ref_uri}?fields=name"), vec![]).await;
        assert_eq!(record["finalized"], true);
        assert!(record["payload"].is_null());

        let (_, log) = call(&app, Method::GET, "/api/v1/replication-log/builds", vec![]).await;
        let entries = log["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["sequence"], 1);
        assert_eq!(log["last_sequence"], 1);

        let (_, log) = call(
            &app,
            Method::GET,
            "/api/v1/replication-log/builds?after=1",
            vec![],
        )
        .await;
        assert!(log["entries"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn finalize_with_wrong_hash_is_bad_request() {
        let app = app();
        let payload = Document::new().encode().unwrap();
        let hash = arca_crypto::blob_id(&payload);
        call(
            &app,
            Method::PUT,
            &format!("/api/v1/refs/builds/b/k/{}", hex(&hash)),
            payload,
        )
        .await;

        let wrong = arca_crypto::blob_id(b"wrong");
        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/api/v1/refs/builds/b/k/finalize/{}", hex(&wrong)),
            vec![],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn namespaces_and_bulk_deletes() {
        let app = app();
        let payload = Document::new().encode().unwrap();
        let hash = arca_crypto::blob_id(&payload);
        for (ns, bucket, key) in [("alpha", "b1", "k1"), ("alpha", "b1", "k2"), ("beta", "b", "k")] {
            let (status, _) = call(
                &app,
                Method::PUT,
                &format!("/api/v1/refs/{ns}/{bucket}/{key}/{}", hex(&hash)),
                payload.clone(),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = call(&app, Method::GET, "/api/v1/refs", vec![]).await;
        assert_eq!(body["namespaces"], serde_json::json!(["alpha", "beta"]));

        let (_, body) = call(&app, Method::DELETE, "/api/v1/refs/alpha/b1", vec![]).await;
        assert_eq!(body["deleted"], 2);
        let (_, body) = call(&app, Method::DELETE, "/api/v1/refs/beta", vec![]).await;
        assert_eq!(body["deleted"], 1);

        let (_, body) = call(&app, Method::GET, "/api/v1/refs", vec![]).await;
        assert_eq!(body["namespaces"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn authorization_is_enforced() {
        let config = ServerConfig {
            auth: AuthConfig {
                allow_anonymous: false,
                tokens: vec![TokenGrant {
                    token: "ci".into(),
                    namespaces: vec!["builds".into()],
                    access: Access::Write,
                }],
            },
            ..ServerConfig::default()
        };
        let app = ArcaServer::new(config).unwrap().router();
        let data = b"x".to_vec();
        let uri = format!("/api/v1/blobs/builds/{}", hex(&arca_crypto::blob_id(&data)));

        let (status, _) = call(&app, Method::PUT, &uri, data.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call_as(&app, Method::PUT, &uri, data.clone(), Some("ci")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call_as(&app, Method::DELETE, "/api/v1/refs/builds", vec![], Some("ci")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call_as(
            &app,
            Method::GET,
            "/api/v1/replication-log/other",
            vec![],
            Some("ci"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
