use crate::file::FileError;
use crate::index::IndexError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Table {table} has no column {column}")]
    ColumnNotFound { table: String, column: String },
}

pub type DbResult<T> = Result<T, DbError>;
