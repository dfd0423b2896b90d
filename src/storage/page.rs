use crate::file::{MAX_SLOTS, PAGE_HEADER_SIZE, PAGE_SIZE, PageId, PageType, SlotId};

use super::error::{StorageError, StorageResult};

/// Size of one slot directory entry: offset (u16) + length (u16)
const SLOT_ENTRY_SIZE: usize = 4;

/// Fixed-layout page header occupying the first 32 bytes of every page.
///
/// `free_space_offset` and `slot_count` are only meaningful for slotted
/// (Meta/Data) pages; Index and Free pages keep them zeroed.
#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    pub page_id: PageId,
    pub page_type: PageType,
    pub free_space_offset: u32,
    pub slot_count: u16,
    pub checksum: u32,
}

impl PageHeader {
    fn write_to(&self, buffer: &mut [u8]) {
        buffer[0..4].copy_from_slice(&self.page_id.to_le_bytes());
        buffer[4] = self.page_type.as_u8();
        buffer[8..12].copy_from_slice(&self.free_space_offset.to_le_bytes());
        buffer[12..14].copy_from_slice(&self.slot_count.to_le_bytes());
        buffer[16..20].copy_from_slice(&self.checksum.to_le_bytes());
    }

    fn read_from(buffer: &[u8]) -> StorageResult<Self> {
        let page_id = u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        let page_type = PageType::from_u8(buffer[4])
            .ok_or_else(|| StorageError::Corrupted(format!("unknown page type {}", buffer[4])))?;
        let free_space_offset = u32::from_le_bytes([buffer[8], buffer[9], buffer[10], buffer[11]]);
        let slot_count = u16::from_le_bytes([buffer[12], buffer[13]]);
        let checksum = u32::from_le_bytes([buffer[16], buffer[17], buffer[18], buffer[19]]);

        Ok(Self {
            page_id,
            page_type,
            free_space_offset,
            slot_count,
            checksum,
        })
    }
}

/// In-memory image of one 4KB page with slotted-record access.
///
/// Records grow upward from the header; the slot directory grows downward
/// from the end of the page. A slot offset of 0 marks a deleted record.
pub struct Page {
    header: PageHeader,
    buffer: Vec<u8>,
}

impl Page {
    /// Create a blank page of the given type.
    pub fn new(page_id: PageId, page_type: PageType) -> Self {
        let free_space_offset = if page_type.is_slotted() {
            PAGE_HEADER_SIZE as u32
        } else {
            0
        };
        let header = PageHeader {
            page_id,
            page_type,
            free_space_offset,
            slot_count: 0,
            checksum: 0,
        };

        let mut buffer = vec![0u8; PAGE_SIZE];
        header.write_to(&mut buffer);

        Self { header, buffer }
    }

    /// Parse a page from its on-disk image, verifying structure and checksum.
    ///
    /// A stored checksum of 0 means "never computed" and skips verification,
    /// so pages written raw by the file layer still load.
    pub fn load(buffer: Vec<u8>) -> StorageResult<Self> {
        if buffer.len() != PAGE_SIZE {
            return Err(StorageError::Corrupted(format!(
                "page image is {} bytes, expected {}",
                buffer.len(),
                PAGE_SIZE
            )));
        }

        let header = PageHeader::read_from(&buffer)?;

        if header.checksum != 0 {
            let actual = crc32fast::hash(&buffer[PAGE_HEADER_SIZE..]);
            if actual != header.checksum {
                return Err(StorageError::Corrupted(format!(
                    "checksum mismatch on page {}: stored {:#x}, computed {:#x}",
                    header.page_id, header.checksum, actual
                )));
            }
        }

        if header.page_type.is_slotted() {
            if header.slot_count > MAX_SLOTS {
                return Err(StorageError::Corrupted(format!(
                    "page {} claims {} slots",
                    header.page_id, header.slot_count
                )));
            }
            let fso = header.free_space_offset as usize;
            if fso < PAGE_HEADER_SIZE || fso > PAGE_SIZE {
                return Err(StorageError::Corrupted(format!(
                    "page {} has free space offset {}",
                    header.page_id, fso
                )));
            }
        }

        Ok(Self { header, buffer })
    }

    pub fn id(&self) -> PageId {
        self.header.page_id
    }

    pub fn page_type(&self) -> PageType {
        self.header.page_type
    }

    pub fn slot_count(&self) -> SlotId {
        self.header.slot_count
    }

    /// Serialize the page, refreshing the header and checksum in place.
    pub fn bytes(&mut self) -> &[u8] {
        self.header.write_to(&mut self.buffer);
        self.header.checksum = crc32fast::hash(&self.buffer[PAGE_HEADER_SIZE..]);
        self.header.write_to(&mut self.buffer);
        &self.buffer
    }

    /// Page body after the 32-byte header. Index nodes serialize here.
    pub fn body(&self) -> &[u8] {
        &self.buffer[PAGE_HEADER_SIZE..]
    }

    pub fn body_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[PAGE_HEADER_SIZE..]
    }

    /// Contiguous free bytes between the record area and the slot directory.
    pub fn free_space(&self) -> usize {
        let fso = self.header.free_space_offset as usize;
        let directory = self.header.slot_count as usize * SLOT_ENTRY_SIZE;
        (PAGE_SIZE - directory).saturating_sub(fso)
    }

    fn slot_position(slot_id: SlotId) -> usize {
        PAGE_SIZE - (slot_id as usize + 1) * SLOT_ENTRY_SIZE
    }

    fn slot_entry(&self, slot_id: SlotId) -> (u16, u16) {
        let pos = Self::slot_position(slot_id);
        let offset = u16::from_le_bytes([self.buffer[pos], self.buffer[pos + 1]]);
        let length = u16::from_le_bytes([self.buffer[pos + 2], self.buffer[pos + 3]]);
        (offset, length)
    }

    fn set_slot_entry(&mut self, slot_id: SlotId, offset: u16, length: u16) {
        let pos = Self::slot_position(slot_id);
        self.buffer[pos..pos + 2].copy_from_slice(&offset.to_le_bytes());
        self.buffer[pos + 2..pos + 4].copy_from_slice(&length.to_le_bytes());
    }

    /// Insert a record payload, reusing a deleted slot when one exists.
    ///
    /// Returns the slot ID, or `None` when the page cannot hold the payload.
    /// Reused slots keep their ID stable and cost no directory space.
    pub fn try_insert_record(&mut self, payload: &[u8]) -> Option<SlotId> {
        if payload.is_empty() || payload.len() > u16::MAX as usize {
            return None;
        }

        let reusable = (0..self.header.slot_count).find(|&s| self.slot_entry(s).0 == 0);

        let needed = match reusable {
            Some(_) => payload.len(),
            None => payload.len() + SLOT_ENTRY_SIZE,
        };
        if needed > self.free_space() {
            return None;
        }
        if reusable.is_none() && self.header.slot_count >= MAX_SLOTS {
            return None;
        }

        let offset = self.header.free_space_offset as usize;
        self.buffer[offset..offset + payload.len()].copy_from_slice(payload);
        self.header.free_space_offset += payload.len() as u32;

        let slot_id = match reusable {
            Some(s) => s,
            None => {
                let s = self.header.slot_count;
                self.header.slot_count += 1;
                s
            }
        };
        self.set_slot_entry(slot_id, offset as u16, payload.len() as u16);

        Some(slot_id)
    }

    /// Read one record's payload.
    pub fn read_record(&self, slot_id: SlotId) -> StorageResult<Vec<u8>> {
        if slot_id >= self.header.slot_count {
            return Err(StorageError::SlotOutOfRange {
                page_id: self.header.page_id,
                slot_id,
            });
        }

        let (offset, length) = self.slot_entry(slot_id);
        if offset == 0 {
            return Err(StorageError::SlotEmpty {
                page_id: self.header.page_id,
                slot_id,
            });
        }

        let start = offset as usize;
        let end = start + length as usize;
        if start < PAGE_HEADER_SIZE || end > PAGE_SIZE {
            return Err(StorageError::Corrupted(format!(
                "slot {} on page {} points outside the page",
                slot_id, self.header.page_id
            )));
        }

        Ok(self.buffer[start..end].to_vec())
    }

    /// Mark a record deleted by zeroing its slot entry. Idempotent; the
    /// payload bytes stay in place until the next vacuum.
    pub fn delete_record(&mut self, slot_id: SlotId) -> StorageResult<()> {
        if slot_id >= self.header.slot_count {
            return Err(StorageError::SlotOutOfRange {
                page_id: self.header.page_id,
                slot_id,
            });
        }

        self.set_slot_entry(slot_id, 0, 0);
        Ok(())
    }

    /// True if the slot exists and still points at a live record.
    pub fn is_slot_live(&self, slot_id: SlotId) -> bool {
        slot_id < self.header.slot_count && self.slot_entry(slot_id).0 != 0
    }

    /// Compact the record area, squeezing out the space held by deleted
    /// records. Live slot IDs are preserved; deleted slots stay reusable.
    pub fn vacuum(&mut self) -> StorageResult<()> {
        let mut live = Vec::new();
        for slot_id in 0..self.header.slot_count {
            let (offset, length) = self.slot_entry(slot_id);
            if offset == 0 {
                continue;
            }
            let start = offset as usize;
            let end = start + length as usize;
            if start < PAGE_HEADER_SIZE || end > PAGE_SIZE {
                return Err(StorageError::Corrupted(format!(
                    "slot {} on page {} points outside the page",
                    slot_id, self.header.page_id
                )));
            }
            live.push((slot_id, self.buffer[start..end].to_vec()));
        }

        let mut cursor = PAGE_HEADER_SIZE;
        for (slot_id, payload) in &live {
            self.buffer[cursor..cursor + payload.len()].copy_from_slice(payload);
            self.set_slot_entry(*slot_id, cursor as u16, payload.len() as u16);
            cursor += payload.len();
        }
        self.header.free_space_offset = cursor as u32;

        let directory_start = PAGE_SIZE - self.header.slot_count as usize * SLOT_ENTRY_SIZE;
        self.buffer[cursor..directory_start].fill(0);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_page_layout() {
        let page = Page::new(7, PageType::Data);
        assert_eq!(page.id(), 7);
        assert_eq!(page.page_type(), PageType::Data);
        assert_eq!(page.slot_count(), 0);
        assert_eq!(page.free_space(), PAGE_SIZE - PAGE_HEADER_SIZE);
    }

    #[test]
    fn test_insert_and_read() {
        let mut page = Page::new(1, PageType::Data);

        let a = page.try_insert_record(b"hello").unwrap();
        let b = page.try_insert_record(b"world!").unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(page.slot_count(), 2);

        assert_eq!(page.read_record(0).unwrap(), b"hello");
        assert_eq!(page.read_record(1).unwrap(), b"world!");
    }

    #[test]
    fn test_delete_then_read_fails() {
        let mut page = Page::new(1, PageType::Data);
        let slot = page.try_insert_record(b"doomed").unwrap();

        page.delete_record(slot).unwrap();
        assert!(matches!(
            page.read_record(slot),
            Err(StorageError::SlotEmpty { .. })
        ));

        // idempotent
        page.delete_record(slot).unwrap();
    }

    #[test]
    fn test_slot_reuse_after_delete() {
        let mut page = Page::new(1, PageType::Data);
        page.try_insert_record(b"first").unwrap();
        let victim = page.try_insert_record(b"second").unwrap();
        page.try_insert_record(b"third").unwrap();

        page.delete_record(victim).unwrap();
        let reused = page.try_insert_record(b"replacement").unwrap();

        assert_eq!(reused, victim);
        assert_eq!(page.slot_count(), 3);
        assert_eq!(page.read_record(victim).unwrap(), b"replacement");
    }

    #[test]
    fn test_out_of_range_slot() {
        let page = Page::new(1, PageType::Data);
        assert!(matches!(
            page.read_record(9),
            Err(StorageError::SlotOutOfRange { .. })
        ));
    }

    #[test]
    fn test_insert_rejects_when_full() {
        let mut page = Page::new(1, PageType::Data);

        let big = vec![0xAB; 2000];
        assert!(page.try_insert_record(&big).is_some());
        assert!(page.try_insert_record(&big).is_some());
        // third copy does not fit: 2 * (2000 + 4) leaves < 2000 bytes
        assert!(page.try_insert_record(&big).is_none());
    }

    #[test]
    fn test_vacuum_reclaims_space() {
        let mut page = Page::new(1, PageType::Data);

        let keep_a = page.try_insert_record(&vec![1u8; 1000]).unwrap();
        let drop_b = page.try_insert_record(&vec![2u8; 1000]).unwrap();
        let keep_c = page.try_insert_record(&vec![3u8; 1000]).unwrap();

        page.delete_record(drop_b).unwrap();
        let before = page.free_space();
        page.vacuum().unwrap();
        let after = page.free_space();

        assert_eq!(after, before + 1000);
        assert_eq!(page.read_record(keep_a).unwrap(), vec![1u8; 1000]);
        assert_eq!(page.read_record(keep_c).unwrap(), vec![3u8; 1000]);
        // deleted slot is still reusable
        assert_eq!(page.try_insert_record(b"new").unwrap(), drop_b);
    }

    #[test]
    fn test_round_trip_through_bytes() {
        let mut page = Page::new(3, PageType::Data);
        page.try_insert_record(b"persisted").unwrap();

        let image = page.bytes().to_vec();
        let loaded = Page::load(image).unwrap();

        assert_eq!(loaded.id(), 3);
        assert_eq!(loaded.slot_count(), 1);
        assert_eq!(loaded.read_record(0).unwrap(), b"persisted");
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut page = Page::new(3, PageType::Data);
        page.try_insert_record(b"guarded").unwrap();

        let mut image = page.bytes().to_vec();
        image[100] ^= 0xFF;

        assert!(matches!(
            Page::load(image),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn test_blank_page_loads_without_checksum() {
        // pages written raw by the file layer carry a zero checksum
        let mut image = vec![0u8; PAGE_SIZE];
        image[4] = PageType::Data.as_u8();
        image[8..12].copy_from_slice(&(PAGE_HEADER_SIZE as u32).to_le_bytes());

        let page = Page::load(image).unwrap();
        assert_eq!(page.slot_count(), 0);
    }
}
