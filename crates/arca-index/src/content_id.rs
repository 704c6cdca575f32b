use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use arca_store::BlobStore;
use arca_types::{BlobId, ContentId, NamespaceId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IndexError, IndexResult};

/// One weighted blob candidate of a content id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentIdCandidate {
    pub blob: BlobId,
    /// Higher weight means preferred.
    pub weight: i32,
}

/// Weighted alias mapping from [`ContentId`] to blobs.
#[async_trait]
pub trait ContentIdStore: Send + Sync {
    /// Insert a mapping, or strengthen an existing one to `weight` if that is
    /// higher than its current weight.
    async fn put(
        &self,
        ns: &NamespaceId,
        content_id: &ContentId,
        blob: &BlobId,
        weight: i32,
    ) -> IndexResult<()>;

    /// The best current candidate. Candidates whose blob still exists win
    /// over stale ones; among equals the highest weight wins. When every
    /// candidate is stale the best stale one is returned, so callers can
    /// report its blob as missing. Fails with
    /// [`IndexError::ContentIdNotFound`] when no mapping exists.
    async fn resolve(&self, ns: &NamespaceId, content_id: &ContentId) -> IndexResult<BlobId>;

    /// All recorded candidates, best first, without checking existence.
    async fn candidates(
        &self,
        ns: &NamespaceId,
        content_id: &ContentId,
    ) -> IndexResult<Vec<ContentIdCandidate>>;

    /// Returns `true` if any content id in the namespace maps to `blob`.
    async fn is_alias_target(&self, ns: &NamespaceId, blob: &BlobId) -> IndexResult<bool>;
}

#[derive(Clone, Copy, Debug)]
struct Mapping {
    candidate: ContentIdCandidate,
    /// Insert order; later inserts win weight ties.
    revision: u64,
}

#[derive(Default)]
struct State {
    mappings: HashMap<NamespaceId, HashMap<ContentId, Vec<Mapping>>>,
    revision: u64,
}

/// In-memory [`ContentIdStore`] that checks candidates against a blob
/// store on resolve, so stale mappings to reclaimed blobs lose to live ones.
pub struct InMemoryContentIdStore {
    blobs: Arc<dyn BlobStore>,
    state: RwLock<State>,
}

impl InMemoryContentIdStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            state: RwLock::new(State::default()),
        }
    }

    fn ranked(&self, ns: &NamespaceId, content_id: &ContentId) -> Vec<Mapping> {
        let state = self.state.read().expect("lock poisoned");
        let mut mappings = state
            .mappings
            .get(ns)
            .and_then(|ids| ids.get(content_id))
            .cloned()
            .unwrap_or_default();
        mappings.sort_by(|a, b| {
            b.candidate
                .weight
                .cmp(&a.candidate.weight)
                .then(b.revision.cmp(&a.revision))
        });
        mappings
    }
}

impl std::fmt::Debug for InMemoryContentIdStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let namespaces = self.state.read().expect("lock poisoned").mappings.len();
        f.debug_struct("InMemoryContentIdStore")
            .field("namespaces", &namespaces)
            .finish()
    }
}

#[async_trait]
impl ContentIdStore for InMemoryContentIdStore {
    async fn put(
        &self,
        ns: &NamespaceId,
        content_id: &ContentId,
        blob: &BlobId,
        weight: i32,
    ) -> IndexResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.revision += 1;
        let revision = state.revision;
        let mappings = state
            .mappings
            .entry(ns.clone())
            .or_default()
            .entry(*content_id)
            .or_default();

        match mappings.iter_mut().find(|m| m.candidate.blob == *blob) {
            Some(existing) => {
                if weight > existing.candidate.weight {
                    existing.candidate.weight = weight;
                    existing.revision = revision;
                }
            }
            None => mappings.push(Mapping {
                candidate: ContentIdCandidate {
                    blob: *blob,
                    weight,
                },
                revision,
            }),
        }
        debug!(namespace = %ns, content_id = %content_id, blob = %blob, weight, "content id mapped");
        Ok(())
    }

    async fn resolve(&self, ns: &NamespaceId, content_id: &ContentId) -> IndexResult<BlobId> {
        let ranked = self.ranked(ns, content_id);
        let ids: Vec<BlobId> = ranked.iter().map(|m| m.candidate.blob).collect();
        let Some(&best) = ids.first() else {
            return Err(IndexError::ContentIdNotFound {
                namespace: ns.clone(),
                content_id: *content_id,
            });
        };
        let present = self.blobs.exists(ns, &ids).await?;
        Ok(ids
            .into_iter()
            .zip(present)
            .find_map(|(id, present)| present.then_some(id))
            .unwrap_or(best))
    }

    async fn candidates(
        &self,
        ns: &NamespaceId,
        content_id: &ContentId,
    ) -> IndexResult<Vec<ContentIdCandidate>> {
        Ok(self
            .ranked(ns, content_id)
            .into_iter()
            .map(|m| m.candidate)
            .collect())
    }

    async fn is_alias_target(&self, ns: &NamespaceId, blob: &BlobId) -> IndexResult<bool> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.mappings.get(ns).is_some_and(|ids| {
            ids.values()
                .flatten()
                .any(|m| m.candidate.blob == *blob)
        }))
    }
}
