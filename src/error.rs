use thiserror::Error;

/// Errors surfaced by the storage engine.
///
/// Every fallible operation on [`crate::store::Store`] returns one of these; the engine never
/// panics on caller-reachable input.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bad range bound: value given without a known attribute")]
    BadBound,

    #[error("schema conflict for attribute '{attribute}': {reason}")]
    SchemaConflict { attribute: String, reason: String },

    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("store is closed")]
    Closed,

    #[error("corrupt index entry: {0}")]
    Corrupt(String),

    #[error("unsupported key size {requested}: this build only supports {supported}")]
    UnsupportedKeySize { requested: usize, supported: usize },

    #[error("storage I/O error")]
    Io(#[from] rocksdb::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
