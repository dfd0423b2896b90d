use crate::file::FileError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Corrupted page: {0}")]
    Corrupted(String),

    #[error("Invalid slot: page_id={page_id}, slot_id={slot_id}")]
    SlotOutOfRange { page_id: u32, slot_id: u16 },

    #[error("Slot is empty or deleted: page_id={page_id}, slot_id={slot_id}")]
    SlotEmpty { page_id: u32, slot_id: u16 },

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} already exists")]
    TableAlreadyExists(String),

    #[error("RID {rid} does not belong to table {table}")]
    RidNotInTable { table: String, rid: String },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("NULL value for NOT NULL column: {0}")]
    NullConstraintViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Catalog page is full")]
    CatalogFull,
}

pub type StorageResult<T> = Result<T, StorageError>;
