use crate::flags::EntryFlags;

/// Errors from tree operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Serialized node data is corrupt: bad signature byte, truncated
    /// entry, or undecodable name.
    #[error("malformed tree: {0}")]
    MalformedTree(String),

    /// An entry was accessed as the wrong kind.
    #[error("entry {name} with flags {flags} is not a {expected}")]
    InvalidAccessor {
        name: String,
        flags: EntryFlags,
        expected: &'static str,
    },

    #[error("entry {0} already exists")]
    DuplicateEntry(String),

    #[error("no entry at {0}")]
    NotFound(String),

    #[error("invalid entry name {0:?}")]
    InvalidName(String),

    #[error("store error: {0}")]
    Store(#[from] arca_store::StoreError),
}

pub type TreeResult<T> = Result<T, TreeError>;
