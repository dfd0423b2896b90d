use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{FileError, FileResult};
use super::{PAGE_HEADER_SIZE, PAGE_SIZE, PageId, PageType};

/// Owns one paged database file and translates page IDs to byte offsets.
///
/// Page IDs are implicit from the file offset (`offset / PAGE_SIZE`) and are
/// handed out monotonically by `allocate_page`; freed pages are never reused.
pub struct FileManager {
    file: File,
    path: PathBuf,
    page_count: u32,
}

impl FileManager {
    /// Open an existing database file or create a new one.
    ///
    /// A new file gets page 0 initialized as a Meta page. An existing file
    /// must be an exact multiple of the page size.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        if file_size % PAGE_SIZE as u64 != 0 {
            return Err(FileError::MisalignedFile(file_size));
        }

        let mut manager = Self {
            file,
            path,
            page_count: (file_size / PAGE_SIZE as u64) as u32,
        };

        if manager.page_count == 0 {
            manager.allocate_page(PageType::Meta)?;
        }

        Ok(manager)
    }

    /// Read one page; the returned buffer is always exactly PAGE_SIZE bytes.
    pub fn read_page(&mut self, page_id: PageId) -> FileResult<Vec<u8>> {
        if page_id >= self.page_count {
            return Err(FileError::PageOutOfRange {
                page_id,
                page_count: self.page_count,
            });
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; PAGE_SIZE];
        self.file.read_exact(&mut buffer).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                FileError::Corrupted(format!("short read at page {}", page_id))
            } else {
                FileError::Io(e)
            }
        })?;

        Ok(buffer)
    }

    /// Write one page back to its fixed offset.
    pub fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> FileResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        if page_id >= self.page_count {
            return Err(FileError::PageOutOfRange {
                page_id,
                page_count: self.page_count,
            });
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;

        Ok(())
    }

    /// Append a zero-initialized page of the given type at the end of the
    /// file and return its ID. IDs only grow; logical frees do not recycle.
    pub fn allocate_page(&mut self, page_type: PageType) -> FileResult<PageId> {
        let page_id = self.page_count;

        let mut buffer = vec![0u8; PAGE_SIZE];
        buffer[0..4].copy_from_slice(&page_id.to_le_bytes());
        buffer[4] = page_type.as_u8();
        if page_type.is_slotted() {
            buffer[8..12].copy_from_slice(&(PAGE_HEADER_SIZE as u32).to_le_bytes());
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buffer)?;

        self.page_count += 1;
        Ok(page_id)
    }

    /// Force buffered writes to durable storage.
    pub fn flush(&mut self) -> FileResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Number of pages currently in the file.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
