mod error;
mod file_manager;

pub use error::{FileError, FileResult};
pub use file_manager::FileManager;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Bytes reserved for the page header at the start of every page
pub const PAGE_HEADER_SIZE: usize = 32;

/// Maximum number of slot directory entries in a slotted page
pub const MAX_SLOTS: u16 = 1024;

/// Page ID type (implicit from file offset / PAGE_SIZE)
pub type PageId = u32;

/// Slot identifier within a page
pub type SlotId = u16;

/// On-disk sentinel for "no page" in 4-byte page pointers
pub const NO_PAGE: u32 = u32::MAX;

/// Page type tag stored at byte 4 of every page header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Metadata/catalog pages
    Meta = 0,
    /// Table data pages
    Data = 1,
    /// B+Tree node and index metadata pages
    Index = 2,
    /// Unused/freed pages
    Free = 3,
}

impl PageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PageType::Meta),
            1 => Some(PageType::Data),
            2 => Some(PageType::Index),
            3 => Some(PageType::Free),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Only Meta and Data pages carry slot directory semantics
    pub fn is_slotted(self) -> bool {
        matches!(self, PageType::Meta | PageType::Data)
    }
}
