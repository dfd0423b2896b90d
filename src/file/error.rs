use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Page {page_id} out of range (file has {page_count} pages)")]
    PageOutOfRange { page_id: u32, page_count: u32 },

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("File size {0} is not a multiple of the page size")]
    MisalignedFile(u64),

    #[error("Corrupted file: {0}")]
    Corrupted(String),
}

pub type FileResult<T> = Result<T, FileError>;
