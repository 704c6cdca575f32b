//! Request handlers. Each one authorizes against the namespace in its path
//! before touching any store.

use arca_refs::{ObjectRecord, PutOutcome};
use arca_types::{BlobId, BucketId, ContentId, NamespaceId, RefKey};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::auth::{Access, Credentials};
use crate::error::{ServerError, ServerResult};
use crate::router::ServerState;

/// Largest page the replication log endpoint returns.
const MAX_LOG_PAGE: usize = 10_000;
const DEFAULT_LOG_PAGE: usize = 1_000;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn get_blob(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((ns, id)): Path<(NamespaceId, BlobId)>,
) -> ServerResult<Response> {
    state
        .require(&Credentials::from_headers(&headers), &ns, Access::Read)
        .await?;
    let data = state.blobs.get(&ns, &id).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data).into_response())
}

pub async fn put_blob(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((ns, id)): Path<(NamespaceId, BlobId)>,
    body: Bytes,
) -> ServerResult<Json<Value>> {
    state
        .require(&Credentials::from_headers(&headers), &ns, Access::Write)
        .await?;
    let stored = state.blobs.put(&ns, &id, body).await?;
    debug!(namespace = %ns, blob = %stored.short_hex(), "blob uploaded");
    Ok(Json(json!({ "identifier": stored })))
}

pub async fn get_content_id(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((ns, cid)): Path<(NamespaceId, ContentId)>,
) -> ServerResult<Json<Value>> {
    state
        .require(&Credentials::from_headers(&headers), &ns, Access::Read)
        .await?;
    let blob = state.content_ids.resolve(&ns, &cid).await?;
    let candidates = state.content_ids.candidates(&ns, &cid).await?;
    Ok(Json(json!({
        "content_id": cid,
        "blob": blob,
        "candidates": candidates,
    })))
}

pub async fn put_content_id(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((ns, cid, blob, weight)): Path<(NamespaceId, ContentId, BlobId, i32)>,
) -> ServerResult<Json<Value>> {
    state
        .require(&Credentials::from_headers(&headers), &ns, Access::Write)
        .await?;
    state.content_ids.put(&ns, &cid, &blob, weight).await?;
    Ok(Json(json!({ "content_id": cid, "blob": blob, "weight": weight })))
}

/// Namespaces holding records that the caller may read.
pub async fn list_namespaces(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> ServerResult<Json<Value>> {
    let credentials = Credentials::from_headers(&headers);
    let all: Vec<NamespaceId> = state.objects.namespaces().try_collect().await?;
    let mut visible = Vec::with_capacity(all.len());
    for ns in all {
        if state.authorizer.authorize(&credentials, &ns, Access::Read).await? {
            visible.push(ns);
        }
    }
    Ok(Json(json!({ "namespaces": visible })))
}

#[derive(Debug, Default, Deserialize)]
pub struct FieldsQuery {
    /// Comma-separated field names.
    pub fields: Option<String>,
}

impl FieldsQuery {
    fn field_list(&self) -> Option<Vec<String>> {
        self.fields.as_ref().map(|f| {
            f.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }
}

fn record_json(record: &ObjectRecord, payload: Option<&Bytes>) -> Value {
    json!({
        "namespace": record.namespace,
        "bucket": record.bucket,
        "key": record.key,
        "blob_id": record.blob_id,
        "finalized": record.finalized,
        "last_modified": record.last_modified,
        "last_access": record.last_access,
        "payload": payload.map(hex::encode),
    })
}

pub async fn get_ref(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((ns, bucket, key)): Path<(NamespaceId, BucketId, RefKey)>,
    Query(query): Query<FieldsQuery>,
) -> ServerResult<Json<Value>> {
    state
        .require(&Credentials::from_headers(&headers), &ns, Access::Read)
        .await?;
    let fields = query.field_list();
    let (record, payload) = state
        .objects
        .get(&ns, &bucket, &key, fields.as_deref())
        .await?;
    Ok(Json(record_json(&record, payload.as_ref())))
}

pub async fn put_ref(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((ns, bucket, key, hash)): Path<(NamespaceId, BucketId, RefKey, BlobId)>,
    body: Bytes,
) -> ServerResult<Json<PutOutcome>> {
    state
        .require(&Credentials::from_headers(&headers), &ns, Access::Write)
        .await?;
    let outcome = state.objects.put(&ns, &bucket, &key, &hash, body).await?;
    Ok(Json(outcome))
}

pub async fn finalize_ref(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((ns, bucket, key, hash)): Path<(NamespaceId, BucketId, RefKey, BlobId)>,
) -> ServerResult<Json<PutOutcome>> {
    state
        .require(&Credentials::from_headers(&headers), &ns, Access::Write)
        .await?;
    let outcome = state.objects.finalize(&ns, &bucket, &key, &hash).await?;
    Ok(Json(outcome))
}

pub async fn delete_ref(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((ns, bucket, key)): Path<(NamespaceId, BucketId, RefKey)>,
) -> ServerResult<Json<Value>> {
    state
        .require(&Credentials::from_headers(&headers), &ns, Access::Write)
        .await?;
    if !state.objects.delete(&ns, &bucket, &key).await? {
        return Err(ServerError::NotFound(format!("object {ns}/{bucket}/{key}")));
    }
    Ok(Json(json!({ "deleted": 1 })))
}

pub async fn delete_bucket(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((ns, bucket)): Path<(NamespaceId, BucketId)>,
) -> ServerResult<Json<Value>> {
    state
        .require(&Credentials::from_headers(&headers), &ns, Access::Write)
        .await?;
    let deleted = state.objects.delete_bucket(&ns, &bucket).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn drop_namespace(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(ns): Path<NamespaceId>,
) -> ServerResult<Json<Value>> {
    state
        .require(&Credentials::from_headers(&headers), &ns, Access::Admin)
        .await?;
    let deleted = state.objects.drop_namespace(&ns).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub after: Option<u64>,
    pub limit: Option<usize>,
}

pub async fn replication_log(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(ns): Path<NamespaceId>,
    Query(query): Query<LogQuery>,
) -> ServerResult<Json<Value>> {
    state
        .require(&Credentials::from_headers(&headers), &ns, Access::Read)
        .await?;
    let limit = query.limit.unwrap_or(DEFAULT_LOG_PAGE).min(MAX_LOG_PAGE);
    let entries = state
        .replication
        .read_from(&ns, query.after.unwrap_or(0), limit)
        .await?;
    let last_sequence = state.replication.last_sequence(&ns).await?;
    Ok(Json(json!({
        "entries": entries,
        "last_sequence": last_sequence,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_query_splits_and_trims() {
        let q = FieldsQuery {
            fields: Some("name, payload,,".into()),
        };
        assert_eq!(q.field_list().unwrap(), vec!["name", "payload"]);
        assert!(FieldsQuery::default().field_list().is_none());
    }
}
