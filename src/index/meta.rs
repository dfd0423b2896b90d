use crate::file::{NO_PAGE, PageId};
use crate::storage::FieldType;

use super::error::{IndexError, IndexResult};

/// "IDX1" little-endian
pub const INDEX_MAGIC: u32 = 0x3144_5849;

/// Raw header at byte 0 of page 0 of an index file. Index files do not
/// use the slotted page layout for their header page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFileHeader {
    pub page_size: u32,
    pub index_count: u32,
    pub first_meta: Option<PageId>,
}

impl IndexFileHeader {
    pub fn write_to(&self, buffer: &mut [u8]) {
        buffer[0..4].copy_from_slice(&INDEX_MAGIC.to_le_bytes());
        buffer[4..8].copy_from_slice(&self.page_size.to_le_bytes());
        buffer[8..12].copy_from_slice(&self.index_count.to_le_bytes());
        buffer[12..16].copy_from_slice(&self.first_meta.unwrap_or(NO_PAGE).to_le_bytes());
    }

    pub fn read_from(buffer: &[u8]) -> IndexResult<Self> {
        let magic = u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        if magic != INDEX_MAGIC {
            return Err(IndexError::InvalidMagic);
        }

        let page_size = u32::from_le_bytes([buffer[4], buffer[5], buffer[6], buffer[7]]);
        let index_count = u32::from_le_bytes([buffer[8], buffer[9], buffer[10], buffer[11]]);
        let first_meta = u32::from_le_bytes([buffer[12], buffer[13], buffer[14], buffer[15]]);

        Ok(Self {
            page_size,
            index_count,
            first_meta: if first_meta == NO_PAGE {
                None
            } else {
                Some(first_meta)
            },
        })
    }
}

/// Per-index descriptor stored in the body of its own Index page.
/// Descriptors form a singly linked chain starting at the file header.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMetadata {
    pub index_id: u32,
    pub key_type: FieldType,
    pub column: String,
    pub root: PageId,
    pub order: u32,
    pub next_meta: Option<PageId>,
}

impl IndexMetadata {
    pub fn write_to(&self, body: &mut [u8]) -> IndexResult<()> {
        let name = self.column.as_bytes();
        if name.len() > u8::MAX as usize {
            return Err(IndexError::Serialization(format!(
                "column name of {} bytes exceeds the 1-byte length prefix",
                name.len()
            )));
        }

        body[0..4].copy_from_slice(&self.index_id.to_le_bytes());
        body[4] = self.key_type.as_u8();
        body[5] = name.len() as u8;
        let mut pos = 6;
        body[pos..pos + name.len()].copy_from_slice(name);
        pos += name.len();
        body[pos..pos + 4].copy_from_slice(&self.root.to_le_bytes());
        body[pos + 4..pos + 8].copy_from_slice(&self.order.to_le_bytes());
        body[pos + 8..pos + 12].copy_from_slice(&self.next_meta.unwrap_or(NO_PAGE).to_le_bytes());
        Ok(())
    }

    pub fn read_from(body: &[u8]) -> IndexResult<Self> {
        let bad = || IndexError::Deserialization("truncated index metadata".to_string());

        let index_id = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        let key_type = FieldType::from_u8(body[4]).ok_or_else(|| {
            IndexError::Deserialization(format!("unknown key type tag {}", body[4]))
        })?;
        let name_len = body[5] as usize;
        if body.len() < 6 + name_len + 12 {
            return Err(bad());
        }

        let column = std::str::from_utf8(&body[6..6 + name_len])
            .map_err(|e| IndexError::Deserialization(format!("invalid UTF-8: {}", e)))?
            .to_string();

        let mut pos = 6 + name_len;
        let root = u32::from_le_bytes([body[pos], body[pos + 1], body[pos + 2], body[pos + 3]]);
        pos += 4;
        let order = u32::from_le_bytes([body[pos], body[pos + 1], body[pos + 2], body[pos + 3]]);
        pos += 4;
        let next = u32::from_le_bytes([body[pos], body[pos + 1], body[pos + 2], body[pos + 3]]);

        Ok(Self {
            index_id,
            key_type,
            column,
            root,
            order,
            next_meta: if next == NO_PAGE { None } else { Some(next) },
        })
    }
}
