//! Transitive reference resolution.
//!
//! Starting from a payload document, [`ReferenceResolver`] collects every
//! blob the document depends on: binary attachments through the content id
//! store, object attachments directly and then recursively through the
//! documents they hold.

use std::collections::HashSet;
use std::sync::Arc;

use arca_index::ContentIdStore;
use arca_store::BlobStore;
use arca_types::{BlobId, ContentId, NamespaceId};
use tracing::debug;

use crate::error::{ResolveError, ResolveResult};
use crate::payload::{Attachment, Document};

/// Default limit on attached-object nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Resolves the blobs reachable from a payload document.
#[derive(Clone)]
pub struct ReferenceResolver {
    blobs: Arc<dyn BlobStore>,
    content_ids: Arc<dyn ContentIdStore>,
    max_depth: usize,
}

impl ReferenceResolver {
    pub fn new(blobs: Arc<dyn BlobStore>, content_ids: Arc<dyn ContentIdStore>) -> Self {
        Self {
            blobs,
            content_ids,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve every blob reachable from `document`.
    ///
    /// Unresolvable aliases do not stop the walk. When any remain, the
    /// result is [`ResolveError::PartialReferenceResolve`] listing all of
    /// them. Otherwise, if any reachable blob is absent, the result is
    /// [`ResolveError::ReferenceIsMissingBlobs`]. Otherwise it is the
    /// deduplicated reachable set in discovery order. Both errors carry
    /// the blobs discovered so far so callers can still index them.
    pub async fn resolve(&self, ns: &NamespaceId, document: &Document) -> ResolveResult<Vec<BlobId>> {
        let mut reachable = Vec::new();
        let mut seen = HashSet::new();
        let mut expanded = HashSet::new();
        let mut unresolved: Vec<ContentId> = Vec::new();

        let mut pending = vec![(document.attachments(), 0usize)];
        while let Some((attachments, depth)) = pending.pop() {
            for attachment in attachments {
                match attachment {
                    Attachment::Binary(content_id) => match self.resolve_content_id(ns, &content_id).await? {
                        Some(blob) => {
                            if seen.insert(blob) {
                                reachable.push(blob);
                            }
                        }
                        None => {
                            if !unresolved.contains(&content_id) {
                                unresolved.push(content_id);
                            }
                        }
                    },
                    Attachment::Object(blob) => {
                        if seen.insert(blob) {
                            reachable.push(blob);
                        }
                        if !expanded.insert(blob) {
                            continue;
                        }
                        if depth + 1 > self.max_depth {
                            return Err(ResolveError::DepthExceeded {
                                max_depth: self.max_depth,
                            });
                        }
                        match self.blobs.get(ns, &blob).await {
                            Ok(bytes) => {
                                let child = Document::decode(&bytes)
                                    .map_err(|source| ResolveError::MalformedAttachment { blob, source })?;
                                pending.push((child.attachments(), depth + 1));
                            }
                            // Reported by the existence check below.
                            Err(e) if e.is_not_found() => {}
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
            }
        }

        if !unresolved.is_empty() {
            debug!(namespace = %ns, count = unresolved.len(), "unresolved content ids");
            return Err(ResolveError::PartialReferenceResolve {
                unresolved,
                reachable,
            });
        }

        let missing = self.blobs.filter_missing(ns, &reachable).await?;
        if !missing.is_empty() {
            debug!(namespace = %ns, count = missing.len(), "referenced blobs missing");
            return Err(ResolveError::ReferenceIsMissingBlobs { missing, reachable });
        }

        debug!(namespace = %ns, count = reachable.len(), "references resolved");
        Ok(reachable)
    }

    /// Alias lookup, falling back to the content id as a literal blob hash.
    async fn resolve_content_id(
        &self,
        ns: &NamespaceId,
        content_id: &ContentId,
    ) -> ResolveResult<Option<BlobId>> {
        match self.content_ids.resolve(ns, content_id).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.is_not_found() => {
                let direct = content_id.as_blob_id();
                Ok(self.blobs.contains(ns, &direct).await?.then_some(direct))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for ReferenceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceResolver")
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
