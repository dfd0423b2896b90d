use crate::file::{FileManager, PageId, PageType};
use crate::storage::{Page, Rid};

use super::error::{IndexError, IndexResult};
use super::key::Key;
use super::node::{InternalNode, LeafEntry, LeafNode, Node};

/// Disk-resident B+Tree mapping keys to RID lists.
///
/// Nodes live in Index pages of the file passed to every operation; the
/// tree itself only remembers its root page and branching order. The
/// owner must persist `root_page_id()` after mutations, since splits and
/// root shrinks move the root.
///
/// A leaf splits when it reaches `order` entries, an internal node when
/// it reaches `order` keys. Underflowing nodes borrow from a sibling
/// before merging; merges can cascade up to the root.
pub struct BPlusTree {
    root: PageId,
    order: usize,
}

impl BPlusTree {
    /// Attach to an existing tree.
    pub fn new(root: PageId, order: usize) -> Self {
        Self { root, order }
    }

    /// Allocate an empty leaf root in `fm` and return the new tree.
    pub fn create(fm: &mut FileManager, order: usize) -> IndexResult<Self> {
        let root = fm.allocate_page(PageType::Index)?;
        let tree = Self { root, order };
        tree.store_node(
            fm,
            root,
            &Node::Leaf(LeafNode {
                parent: None,
                prev: None,
                next: None,
                entries: Vec::new(),
            }),
        )?;
        Ok(tree)
    }

    pub fn root_page_id(&self) -> PageId {
        self.root
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn min_keys(&self, leaf: bool) -> usize {
        if leaf {
            (self.order - 1) / 2
        } else {
            self.order / 2 - 1
        }
    }

    fn load_node(&self, fm: &mut FileManager, page_id: PageId) -> IndexResult<Node> {
        let page = Page::load(fm.read_page(page_id)?)?;
        if page.page_type() != PageType::Index {
            return Err(IndexError::CorruptedNode(page_id));
        }
        Node::read_from(page_id, page.body())
    }

    fn store_node(&self, fm: &mut FileManager, page_id: PageId, node: &Node) -> IndexResult<()> {
        let mut page = Page::new(page_id, PageType::Index);
        node.write_to(page_id, page.body_mut())?;
        fm.write_page(page_id, page.bytes())?;
        Ok(())
    }

    /// Retire a merged-away node's page. Page IDs are never reused.
    fn free_node_page(&self, fm: &mut FileManager, page_id: PageId) -> IndexResult<()> {
        let mut page = Page::new(page_id, PageType::Free);
        fm.write_page(page_id, page.bytes())?;
        Ok(())
    }

    fn set_node_parent(
        &self,
        fm: &mut FileManager,
        page_id: PageId,
        parent: Option<PageId>,
    ) -> IndexResult<()> {
        let mut node = self.load_node(fm, page_id)?;
        node.set_parent(parent);
        self.store_node(fm, page_id, &node)
    }

    /// Descend to the leaf responsible for `key`. Separators route equal
    /// keys to the right child.
    fn find_leaf(&self, fm: &mut FileManager, key: &Key) -> IndexResult<(PageId, LeafNode)> {
        let mut page_id = self.root;
        loop {
            match self.load_node(fm, page_id)? {
                Node::Leaf(leaf) => return Ok((page_id, leaf)),
                Node::Internal(inner) => {
                    let idx = inner
                        .keys
                        .iter()
                        .position(|k| key < k)
                        .unwrap_or(inner.keys.len());
                    page_id = inner.children[idx];
                }
            }
        }
    }

    fn leftmost_leaf(&self, fm: &mut FileManager) -> IndexResult<(PageId, LeafNode)> {
        let mut page_id = self.root;
        loop {
            match self.load_node(fm, page_id)? {
                Node::Leaf(leaf) => return Ok((page_id, leaf)),
                Node::Internal(inner) => page_id = inner.children[0],
            }
        }
    }

    /// Insert one key/RID pair. A key that is already present gets the
    /// RID appended to its list; uniqueness is the caller's policy.
    pub fn insert(&mut self, fm: &mut FileManager, key: Key, rid: Rid) -> IndexResult<()> {
        let (leaf_id, mut leaf) = self.find_leaf(fm, &key)?;

        match leaf.entries.binary_search_by(|e| e.key.cmp(&key)) {
            Ok(idx) => {
                leaf.entries[idx].rids.push(rid);
                self.store_node(fm, leaf_id, &Node::Leaf(leaf))
            }
            Err(idx) => {
                leaf.entries.insert(
                    idx,
                    LeafEntry {
                        key,
                        rids: vec![rid],
                    },
                );
                if leaf.entries.len() >= self.order {
                    self.split_leaf(fm, leaf_id, leaf)
                } else {
                    self.store_node(fm, leaf_id, &Node::Leaf(leaf))
                }
            }
        }
    }

    fn split_leaf(&mut self, fm: &mut FileManager, leaf_id: PageId, mut leaf: LeafNode) -> IndexResult<()> {
        let mid = leaf.entries.len() / 2;
        let right_entries = leaf.entries.split_off(mid);

        let right_id = fm.allocate_page(PageType::Index)?;
        let right = LeafNode {
            parent: leaf.parent,
            prev: Some(leaf_id),
            next: leaf.next,
            entries: right_entries,
        };

        if let Some(next_id) = leaf.next {
            let Node::Leaf(mut next) = self.load_node(fm, next_id)? else {
                return Err(IndexError::CorruptedNode(next_id));
            };
            next.prev = Some(right_id);
            self.store_node(fm, next_id, &Node::Leaf(next))?;
        }
        leaf.next = Some(right_id);

        // the right half's first key becomes the separator; it stays in
        // the leaf as well, so equal keys route right of the separator
        let separator = right.entries[0].key.clone();
        let parent = leaf.parent;

        self.store_node(fm, leaf_id, &Node::Leaf(leaf))?;
        self.store_node(fm, right_id, &Node::Leaf(right))?;
        self.insert_into_parent(fm, leaf_id, separator, right_id, parent)
    }

    fn split_internal(
        &mut self,
        fm: &mut FileManager,
        node_id: PageId,
        mut node: InternalNode,
    ) -> IndexResult<()> {
        let mid = node.keys.len() / 2;
        let promote = node.keys[mid].clone();
        let right_keys = node.keys.split_off(mid + 1);
        node.keys.truncate(mid);
        let right_children = node.children.split_off(mid + 1);

        let right_id = fm.allocate_page(PageType::Index)?;
        let right = InternalNode {
            parent: node.parent,
            keys: right_keys,
            children: right_children,
        };
        for &child in &right.children {
            self.set_node_parent(fm, child, Some(right_id))?;
        }

        let parent = node.parent;
        self.store_node(fm, node_id, &Node::Internal(node))?;
        self.store_node(fm, right_id, &Node::Internal(right))?;
        self.insert_into_parent(fm, node_id, promote, right_id, parent)
    }

    fn insert_into_parent(
        &mut self,
        fm: &mut FileManager,
        left_id: PageId,
        separator: Key,
        right_id: PageId,
        parent: Option<PageId>,
    ) -> IndexResult<()> {
        let Some(parent_id) = parent else {
            let new_root = fm.allocate_page(PageType::Index)?;
            self.store_node(
                fm,
                new_root,
                &Node::Internal(InternalNode {
                    parent: None,
                    keys: vec![separator],
                    children: vec![left_id, right_id],
                }),
            )?;
            self.set_node_parent(fm, left_id, Some(new_root))?;
            self.set_node_parent(fm, right_id, Some(new_root))?;
            self.root = new_root;
            return Ok(());
        };

        let Node::Internal(mut node) = self.load_node(fm, parent_id)? else {
            return Err(IndexError::CorruptedNode(parent_id));
        };
        let idx = node
            .keys
            .iter()
            .position(|k| separator < *k)
            .unwrap_or(node.keys.len());
        node.keys.insert(idx, separator);
        node.children.insert(idx + 1, right_id);

        if node.keys.len() >= self.order {
            self.split_internal(fm, parent_id, node)
        } else {
            self.store_node(fm, parent_id, &Node::Internal(node))
        }
    }

    /// Remove one key/RID pair. Returns false when the pair was not in
    /// the tree. Removing a key's last RID removes the key; underflow is
    /// repaired by borrowing, then merging.
    pub fn delete(&mut self, fm: &mut FileManager, key: &Key, rid: Rid) -> IndexResult<bool> {
        let (leaf_id, mut leaf) = self.find_leaf(fm, key)?;

        let Ok(idx) = leaf.entries.binary_search_by(|e| e.key.cmp(key)) else {
            return Ok(false);
        };
        let before = leaf.entries[idx].rids.len();
        leaf.entries[idx].rids.retain(|r| *r != rid);
        if leaf.entries[idx].rids.len() == before {
            return Ok(false);
        }
        if leaf.entries[idx].rids.is_empty() {
            leaf.entries.remove(idx);
        }

        let underflow = leaf_id != self.root && leaf.entries.len() < self.min_keys(true);
        self.store_node(fm, leaf_id, &Node::Leaf(leaf))?;
        if underflow {
            self.handle_underflow(fm, leaf_id)?;
        }
        self.try_shrink_root(fm)?;
        Ok(true)
    }

    fn handle_underflow(&mut self, fm: &mut FileManager, page_id: PageId) -> IndexResult<()> {
        let node = self.load_node(fm, page_id)?;
        let Some(parent_id) = node.parent() else {
            return Ok(());
        };
        let Node::Internal(mut parent) = self.load_node(fm, parent_id)? else {
            return Err(IndexError::CorruptedNode(parent_id));
        };
        let child_idx = parent
            .children
            .iter()
            .position(|&c| c == page_id)
            .ok_or(IndexError::CorruptedNode(parent_id))?;
        let left_id = (child_idx > 0).then(|| parent.children[child_idx - 1]);
        let right_id = parent.children.get(child_idx + 1).copied();

        match node {
            Node::Leaf(mut leaf) => {
                let min = self.min_keys(true);

                if let Some(lid) = left_id {
                    let Node::Leaf(mut left) = self.load_node(fm, lid)? else {
                        return Err(IndexError::CorruptedNode(lid));
                    };
                    if left.entries.len() > min {
                        let moved = left
                            .entries
                            .pop()
                            .ok_or(IndexError::CorruptedNode(lid))?;
                        leaf.entries.insert(0, moved);
                        parent.keys[child_idx - 1] = leaf.entries[0].key.clone();
                        self.store_node(fm, lid, &Node::Leaf(left))?;
                        self.store_node(fm, page_id, &Node::Leaf(leaf))?;
                        self.store_node(fm, parent_id, &Node::Internal(parent))?;
                        return Ok(());
                    }
                }

                if let Some(rid_) = right_id {
                    let Node::Leaf(mut right) = self.load_node(fm, rid_)? else {
                        return Err(IndexError::CorruptedNode(rid_));
                    };
                    if right.entries.len() > min {
                        let moved = right.entries.remove(0);
                        leaf.entries.push(moved);
                        parent.keys[child_idx] = right.entries[0].key.clone();
                        self.store_node(fm, rid_, &Node::Leaf(right))?;
                        self.store_node(fm, page_id, &Node::Leaf(leaf))?;
                        self.store_node(fm, parent_id, &Node::Internal(parent))?;
                        return Ok(());
                    }
                }

                if let Some(lid) = left_id {
                    let Node::Leaf(mut left) = self.load_node(fm, lid)? else {
                        return Err(IndexError::CorruptedNode(lid));
                    };
                    left.entries.append(&mut leaf.entries);
                    left.next = leaf.next;
                    if let Some(next_id) = leaf.next {
                        let Node::Leaf(mut next) = self.load_node(fm, next_id)? else {
                            return Err(IndexError::CorruptedNode(next_id));
                        };
                        next.prev = Some(lid);
                        self.store_node(fm, next_id, &Node::Leaf(next))?;
                    }
                    self.free_node_page(fm, page_id)?;
                    parent.keys.remove(child_idx - 1);
                    parent.children.remove(child_idx);
                    self.store_node(fm, lid, &Node::Leaf(left))?;
                } else if let Some(rid_) = right_id {
                    let Node::Leaf(mut right) = self.load_node(fm, rid_)? else {
                        return Err(IndexError::CorruptedNode(rid_));
                    };
                    leaf.entries.append(&mut right.entries);
                    leaf.next = right.next;
                    if let Some(next_id) = right.next {
                        let Node::Leaf(mut next) = self.load_node(fm, next_id)? else {
                            return Err(IndexError::CorruptedNode(next_id));
                        };
                        next.prev = Some(page_id);
                        self.store_node(fm, next_id, &Node::Leaf(next))?;
                    }
                    self.free_node_page(fm, rid_)?;
                    parent.keys.remove(child_idx);
                    parent.children.remove(child_idx + 1);
                    self.store_node(fm, page_id, &Node::Leaf(leaf))?;
                } else {
                    return Ok(());
                }
            }
            Node::Internal(mut inner) => {
                let min = self.min_keys(false);

                if let Some(lid) = left_id {
                    let Node::Internal(mut left) = self.load_node(fm, lid)? else {
                        return Err(IndexError::CorruptedNode(lid));
                    };
                    if left.keys.len() > min {
                        let up = left.keys.pop().ok_or(IndexError::CorruptedNode(lid))?;
                        let down = std::mem::replace(&mut parent.keys[child_idx - 1], up);
                        inner.keys.insert(0, down);
                        let moved = left
                            .children
                            .pop()
                            .ok_or(IndexError::CorruptedNode(lid))?;
                        inner.children.insert(0, moved);
                        self.set_node_parent(fm, moved, Some(page_id))?;
                        self.store_node(fm, lid, &Node::Internal(left))?;
                        self.store_node(fm, page_id, &Node::Internal(inner))?;
                        self.store_node(fm, parent_id, &Node::Internal(parent))?;
                        return Ok(());
                    }
                }

                if let Some(rid_) = right_id {
                    let Node::Internal(mut right) = self.load_node(fm, rid_)? else {
                        return Err(IndexError::CorruptedNode(rid_));
                    };
                    if right.keys.len() > min {
                        let up = right.keys.remove(0);
                        let down = std::mem::replace(&mut parent.keys[child_idx], up);
                        inner.keys.push(down);
                        let moved = right.children.remove(0);
                        inner.children.push(moved);
                        self.set_node_parent(fm, moved, Some(page_id))?;
                        self.store_node(fm, rid_, &Node::Internal(right))?;
                        self.store_node(fm, page_id, &Node::Internal(inner))?;
                        self.store_node(fm, parent_id, &Node::Internal(parent))?;
                        return Ok(());
                    }
                }

                if let Some(lid) = left_id {
                    let Node::Internal(mut left) = self.load_node(fm, lid)? else {
                        return Err(IndexError::CorruptedNode(lid));
                    };
                    let separator = parent.keys.remove(child_idx - 1);
                    parent.children.remove(child_idx);
                    left.keys.push(separator);
                    left.keys.append(&mut inner.keys);
                    for &child in &inner.children {
                        self.set_node_parent(fm, child, Some(lid))?;
                    }
                    left.children.append(&mut inner.children);
                    self.free_node_page(fm, page_id)?;
                    self.store_node(fm, lid, &Node::Internal(left))?;
                } else if let Some(rid_) = right_id {
                    let Node::Internal(mut right) = self.load_node(fm, rid_)? else {
                        return Err(IndexError::CorruptedNode(rid_));
                    };
                    let separator = parent.keys.remove(child_idx);
                    parent.children.remove(child_idx + 1);
                    inner.keys.push(separator);
                    inner.keys.append(&mut right.keys);
                    for &child in &right.children {
                        self.set_node_parent(fm, child, Some(page_id))?;
                    }
                    inner.children.append(&mut right.children);
                    self.free_node_page(fm, rid_)?;
                    self.store_node(fm, page_id, &Node::Internal(inner))?;
                } else {
                    return Ok(());
                }
            }
        }

        // a merge shrank the parent; it may now underflow itself
        let parent_underflow =
            parent_id != self.root && parent.keys.len() < self.min_keys(false);
        self.store_node(fm, parent_id, &Node::Internal(parent))?;
        if parent_underflow {
            self.handle_underflow(fm, parent_id)?;
        }
        Ok(())
    }

    /// Collapse an internal root left with a single child after merges.
    fn try_shrink_root(&mut self, fm: &mut FileManager) -> IndexResult<()> {
        loop {
            let Node::Internal(root) = self.load_node(fm, self.root)? else {
                return Ok(());
            };
            if !root.keys.is_empty() {
                return Ok(());
            }
            let child = root.children[0];
            self.free_node_page(fm, self.root)?;
            self.set_node_parent(fm, child, None)?;
            self.root = child;
        }
    }

    /// All RIDs stored under `key`, in insertion order.
    pub fn search(&self, fm: &mut FileManager, key: &Key) -> IndexResult<Vec<Rid>> {
        let (_, leaf) = self.find_leaf(fm, key)?;
        match leaf.entries.binary_search_by(|e| e.key.cmp(key)) {
            Ok(idx) => Ok(leaf.entries[idx].rids.clone()),
            Err(_) => Ok(Vec::new()),
        }
    }

    pub fn contains(&self, fm: &mut FileManager, key: &Key) -> IndexResult<bool> {
        Ok(!self.search(fm, key)?.is_empty())
    }

    /// Walk the leaf chain, yielding every (key, rid) pair with
    /// `min <= key <= max`. `None` bounds are open ends.
    pub fn range_scan(
        &self,
        fm: &mut FileManager,
        min: Option<&Key>,
        max: Option<&Key>,
    ) -> IndexResult<Vec<(Key, Rid)>> {
        let (_, mut leaf) = match min {
            Some(key) => self.find_leaf(fm, key)?,
            None => self.leftmost_leaf(fm)?,
        };

        let mut results = Vec::new();
        loop {
            for entry in &leaf.entries {
                if let Some(lo) = min {
                    if entry.key < *lo {
                        continue;
                    }
                }
                if let Some(hi) = max {
                    if entry.key > *hi {
                        return Ok(results);
                    }
                }
                for rid in &entry.rids {
                    results.push((entry.key.clone(), *rid));
                }
            }

            match leaf.next {
                Some(next_id) => {
                    let Node::Leaf(next) = self.load_node(fm, next_id)? else {
                        return Err(IndexError::CorruptedNode(next_id));
                    };
                    leaf = next;
                }
                None => return Ok(results),
            }
        }
    }
}
