use crate::file::FileError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Not an index file (bad magic)")]
    InvalidMagic,

    #[error("Corrupted index node on page {0}")]
    CorruptedNode(u32),

    #[error("Index node on page {0} does not fit in a page")]
    NodeOverflow(u32),

    #[error("No index on {table}.{column}")]
    IndexNotFound { table: String, column: String },

    #[error("Index on {table}.{column} already exists")]
    IndexAlreadyExists { table: String, column: String },

    #[error("Duplicate key {key} for unique index on {table}.{column}")]
    UniqueViolation {
        table: String,
        column: String,
        key: String,
    },

    #[error("NULL values cannot be indexed")]
    NotIndexable,

    #[error("Key type mismatch: index expects {expected}, got {actual}")]
    KeyTypeMismatch { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

pub type IndexResult<T> = Result<T, IndexError>;
