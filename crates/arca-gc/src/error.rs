/// Errors from garbage collection.
#[derive(Debug, thiserror::Error)]
pub enum GcError {
    #[error("reference store error: {0}")]
    Refs(#[from] arca_refs::RefError),

    #[error("blob store error: {0}")]
    Store(#[from] arca_store::StoreError),

    #[error("index error: {0}")]
    Index(#[from] arca_index::IndexError),
}

pub type GcResult<T> = Result<T, GcError>;
