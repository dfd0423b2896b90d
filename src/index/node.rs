use crate::file::{NO_PAGE, PageId, SlotId};
use crate::storage::Rid;

use super::error::{IndexError, IndexResult};
use super::key::Key;

/// One key in a leaf together with every RID stored under it. Duplicate
/// inserts of the same key append to the RID list.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafEntry {
    pub key: Key,
    pub rids: Vec<Rid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    pub parent: Option<PageId>,
    pub prev: Option<PageId>,
    pub next: Option<PageId>,
    pub entries: Vec<LeafEntry>,
}

/// Internal node: `children.len() == keys.len() + 1` always holds.
/// `children[i]` covers keys strictly below `keys[i]`; equal keys route
/// right.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalNode {
    pub parent: Option<PageId>,
    pub keys: Vec<Key>,
    pub children: Vec<PageId>,
}

/// A B+Tree node as serialized into the body of an Index page.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}

fn encode_link(link: Option<PageId>) -> u32 {
    link.unwrap_or(NO_PAGE)
}

fn decode_link(raw: u32) -> Option<PageId> {
    if raw == NO_PAGE { None } else { Some(raw) }
}

struct Cursor<'a> {
    buffer: &'a [u8],
    pos: usize,
    page_id: PageId,
}

impl<'a> Cursor<'a> {
    fn u8(&mut self) -> IndexResult<u8> {
        if self.pos >= self.buffer.len() {
            return Err(IndexError::CorruptedNode(self.page_id));
        }
        let v = self.buffer[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn u16(&mut self) -> IndexResult<u16> {
        if self.buffer.len() - self.pos < 2 {
            return Err(IndexError::CorruptedNode(self.page_id));
        }
        let v = u16::from_le_bytes([self.buffer[self.pos], self.buffer[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    fn u32(&mut self) -> IndexResult<u32> {
        if self.buffer.len() - self.pos < 4 {
            return Err(IndexError::CorruptedNode(self.page_id));
        }
        let v = u32::from_le_bytes([
            self.buffer[self.pos],
            self.buffer[self.pos + 1],
            self.buffer[self.pos + 2],
            self.buffer[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(v)
    }

    fn key(&mut self) -> IndexResult<Key> {
        Key::read_from(self.buffer, &mut self.pos)
            .map_err(|_| IndexError::CorruptedNode(self.page_id))
    }
}

impl Node {
    pub fn parent(&self) -> Option<PageId> {
        match self {
            Node::Leaf(n) => n.parent,
            Node::Internal(n) => n.parent,
        }
    }

    pub fn set_parent(&mut self, parent: Option<PageId>) {
        match self {
            Node::Leaf(n) => n.parent = parent,
            Node::Internal(n) => n.parent = parent,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    fn encoded_size(&self) -> usize {
        // is_leaf + key_count + parent
        let mut size = 1 + 2 + 4;
        match self {
            Node::Leaf(n) => {
                size += 4 + 4; // prev + next
                for entry in &n.entries {
                    size += entry.key.encoded_len() + 2 + entry.rids.len() * 8;
                }
            }
            Node::Internal(n) => {
                size += 4; // rightmost child
                for key in &n.keys {
                    size += 4 + key.encoded_len();
                }
            }
        }
        size
    }

    /// Serialize into a page body, zeroing the remainder.
    pub fn write_to(&self, page_id: PageId, body: &mut [u8]) -> IndexResult<()> {
        if self.encoded_size() > body.len() {
            return Err(IndexError::NodeOverflow(page_id));
        }

        let mut out = Vec::with_capacity(self.encoded_size());
        match self {
            Node::Leaf(n) => {
                out.push(1);
                out.extend_from_slice(&(n.entries.len() as u16).to_le_bytes());
                out.extend_from_slice(&encode_link(n.parent).to_le_bytes());
                out.extend_from_slice(&encode_link(n.prev).to_le_bytes());
                out.extend_from_slice(&encode_link(n.next).to_le_bytes());
                for entry in &n.entries {
                    entry.key.write_to(&mut out)?;
                    out.extend_from_slice(&(entry.rids.len() as u16).to_le_bytes());
                    for rid in &entry.rids {
                        out.extend_from_slice(&rid.page_id.to_le_bytes());
                        out.extend_from_slice(&(rid.slot_id as u32).to_le_bytes());
                    }
                }
            }
            Node::Internal(n) => {
                if n.children.len() != n.keys.len() + 1 {
                    return Err(IndexError::CorruptedNode(page_id));
                }
                out.push(0);
                out.extend_from_slice(&(n.keys.len() as u16).to_le_bytes());
                out.extend_from_slice(&encode_link(n.parent).to_le_bytes());
                for (child, key) in n.children.iter().zip(&n.keys) {
                    out.extend_from_slice(&child.to_le_bytes());
                    key.write_to(&mut out)?;
                }
                out.extend_from_slice(&n.children[n.keys.len()].to_le_bytes());
            }
        }

        body[..out.len()].copy_from_slice(&out);
        body[out.len()..].fill(0);
        Ok(())
    }

    /// Parse a node from a page body.
    pub fn read_from(page_id: PageId, body: &[u8]) -> IndexResult<Self> {
        let mut cursor = Cursor {
            buffer: body,
            pos: 0,
            page_id,
        };

        let is_leaf = cursor.u8()?;
        let key_count = cursor.u16()? as usize;
        let parent = decode_link(cursor.u32()?);

        match is_leaf {
            1 => {
                let prev = decode_link(cursor.u32()?);
                let next = decode_link(cursor.u32()?);
                let mut entries = Vec::with_capacity(key_count);
                for _ in 0..key_count {
                    let key = cursor.key()?;
                    let rid_count = cursor.u16()? as usize;
                    let mut rids = Vec::with_capacity(rid_count);
                    for _ in 0..rid_count {
                        let rid_page = cursor.u32()?;
                        let rid_slot = cursor.u32()?;
                        rids.push(Rid::new(rid_page, rid_slot as SlotId));
                    }
                    entries.push(LeafEntry { key, rids });
                }
                Ok(Node::Leaf(LeafNode {
                    parent,
                    prev,
                    next,
                    entries,
                }))
            }
            0 => {
                let mut keys = Vec::with_capacity(key_count);
                let mut children = Vec::with_capacity(key_count + 1);
                for _ in 0..key_count {
                    children.push(cursor.u32()?);
                    keys.push(cursor.key()?);
                }
                children.push(cursor.u32()?);
                Ok(Node::Internal(InternalNode {
                    parent,
                    keys,
                    children,
                }))
            }
            _ => Err(IndexError::CorruptedNode(page_id)),
        }
    }
}
