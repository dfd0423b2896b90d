mod btree;
mod error;
mod key;
mod meta;
mod node;


pub use btree::BPlusTree;
pub use error::{IndexError, IndexResult};
pub use key::Key;
pub use meta::{INDEX_MAGIC, IndexFileHeader, IndexMetadata};
pub use node::{InternalNode, LeafEntry, LeafNode, Node};

use std::path::{Path, PathBuf};

use ahash::AHashMap;

use crate::file::{FileManager, PAGE_SIZE, PageId, PageType};
use crate::storage::{FieldType, Page, Rid};

/// Branching order for newly created indexes.
pub const DEFAULT_ORDER: usize = 32;

struct OpenIndex {
    tree: BPlusTree,
    meta_page: PageId,
    meta: IndexMetadata,
}

/// One table's index file: a header page plus a chain of per-index
/// metadata pages, each owning a B+Tree.
struct IndexFile {
    fm: FileManager,
    header: IndexFileHeader,
    trees: AHashMap<String, OpenIndex>,
}

impl IndexFile {
    fn open(path: &Path) -> IndexResult<Self> {
        let existed = path.exists();
        let mut fm = FileManager::open_or_create(path)?;

        let header = if existed {
            let page0 = fm.read_page(0)?;
            IndexFileHeader::read_from(&page0)?
        } else {
            let header = IndexFileHeader {
                page_size: PAGE_SIZE as u32,
                index_count: 0,
                first_meta: None,
            };
            let mut buffer = vec![0u8; PAGE_SIZE];
            header.write_to(&mut buffer);
            fm.write_page(0, &buffer)?;
            header
        };

        let mut file = Self {
            fm,
            header,
            trees: AHashMap::new(),
        };
        file.load_chain()?;
        Ok(file)
    }

    /// Walk the metadata chain and attach a tree per descriptor.
    fn load_chain(&mut self) -> IndexResult<()> {
        let mut cursor = self.header.first_meta;
        while let Some(page_id) = cursor {
            let page = Page::load(self.fm.read_page(page_id)?)?;
            let meta = IndexMetadata::read_from(page.body())?;
            cursor = meta.next_meta;

            let tree = BPlusTree::new(meta.root, meta.order as usize);
            self.trees.insert(
                meta.column.clone(),
                OpenIndex {
                    tree,
                    meta_page: page_id,
                    meta,
                },
            );
        }
        Ok(())
    }

    fn write_header(&mut self) -> IndexResult<()> {
        let mut buffer = vec![0u8; PAGE_SIZE];
        self.header.write_to(&mut buffer);
        self.fm.write_page(0, &buffer)?;
        Ok(())
    }

    fn write_meta(fm: &mut FileManager, page_id: PageId, meta: &IndexMetadata) -> IndexResult<()> {
        let mut page = Page::new(page_id, PageType::Index);
        meta.write_to(page.body_mut())?;
        fm.write_page(page_id, page.bytes())?;
        Ok(())
    }

    fn create_index(&mut self, table: &str, column: &str, key_type: FieldType) -> IndexResult<()> {
        if self.trees.contains_key(column) {
            return Err(IndexError::IndexAlreadyExists {
                table: table.to_string(),
                column: column.to_string(),
            });
        }

        let tree = BPlusTree::create(&mut self.fm, DEFAULT_ORDER)?;
        let meta_page = self.fm.allocate_page(PageType::Index)?;
        let meta = IndexMetadata {
            index_id: self.header.index_count,
            key_type,
            column: column.to_string(),
            root: tree.root_page_id(),
            order: DEFAULT_ORDER as u32,
            next_meta: self.header.first_meta,
        };
        Self::write_meta(&mut self.fm, meta_page, &meta)?;

        self.header.first_meta = Some(meta_page);
        self.header.index_count += 1;
        self.write_header()?;

        self.trees.insert(
            column.to_string(),
            OpenIndex {
                tree,
                meta_page,
                meta,
            },
        );
        Ok(())
    }

    /// Unlink an index's descriptor from the chain. The tree's pages are
    /// retired in place; page IDs are never reused.
    fn drop_index(&mut self, table: &str, column: &str) -> IndexResult<()> {
        let open = self
            .trees
            .remove(column)
            .ok_or_else(|| IndexError::IndexNotFound {
                table: table.to_string(),
                column: column.to_string(),
            })?;

        if self.header.first_meta == Some(open.meta_page) {
            self.header.first_meta = open.meta.next_meta;
        } else {
            let mut cursor = self.header.first_meta;
            while let Some(page_id) = cursor {
                let page = Page::load(self.fm.read_page(page_id)?)?;
                let mut meta = IndexMetadata::read_from(page.body())?;
                if meta.next_meta == Some(open.meta_page) {
                    meta.next_meta = open.meta.next_meta;
                    Self::write_meta(&mut self.fm, page_id, &meta)?;
                    break;
                }
                cursor = meta.next_meta;
            }
        }

        self.header.index_count -= 1;
        self.write_header()
    }

    // takes the map, not `self`, so callers can still borrow `self.fm`
    fn open_index<'a>(
        trees: &'a mut AHashMap<String, OpenIndex>,
        table: &str,
        column: &str,
    ) -> IndexResult<&'a mut OpenIndex> {
        trees.get_mut(column).ok_or_else(|| IndexError::IndexNotFound {
            table: table.to_string(),
            column: column.to_string(),
        })
    }

    /// Rewrite the descriptor when a split or shrink moved the root.
    fn sync_root(fm: &mut FileManager, open: &mut OpenIndex) -> IndexResult<()> {
        if open.tree.root_page_id() != open.meta.root {
            open.meta.root = open.tree.root_page_id();
            Self::write_meta(fm, open.meta_page, &open.meta)?;
        }
        Ok(())
    }

    fn check_key_type(open: &OpenIndex, key: &Key) -> IndexResult<()> {
        if key.field_type() != open.meta.key_type {
            return Err(IndexError::KeyTypeMismatch {
                expected: open.meta.key_type.to_string(),
                actual: key.field_type().to_string(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, table: &str, column: &str, key: Key, rid: Rid) -> IndexResult<()> {
        let open = Self::open_index(&mut self.trees, table, column)?;
        Self::check_key_type(open, &key)?;
        open.tree.insert(&mut self.fm, key, rid)?;
        Self::sync_root(&mut self.fm, open)
    }

    fn delete(&mut self, table: &str, column: &str, key: &Key, rid: Rid) -> IndexResult<bool> {
        let open = Self::open_index(&mut self.trees, table, column)?;
        let removed = open.tree.delete(&mut self.fm, key, rid)?;
        Self::sync_root(&mut self.fm, open)?;
        Ok(removed)
    }

    fn search(&mut self, table: &str, column: &str, key: &Key) -> IndexResult<Vec<Rid>> {
        let open = Self::open_index(&mut self.trees, table, column)?;
        Self::check_key_type(open, key)?;
        open.tree.search(&mut self.fm, key)
    }

    fn range_scan(
        &mut self,
        table: &str,
        column: &str,
        min: Option<&Key>,
        max: Option<&Key>,
    ) -> IndexResult<Vec<(Key, Rid)>> {
        let open = Self::open_index(&mut self.trees, table, column)?;
        open.tree.range_scan(&mut self.fm, min, max)
    }

    fn ensure_unique(&mut self, table: &str, column: &str, key: &Key) -> IndexResult<()> {
        if let Some(open) = self.trees.get_mut(column) {
            if open.tree.contains(&mut self.fm, key)? {
                return Err(IndexError::UniqueViolation {
                    table: table.to_string(),
                    column: column.to_string(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Owns every open index file and routes operations by (table, column).
///
/// Each table gets one `<table>.idx` file next to the data file; table
/// and column names are case-insensitive.
pub struct IndexManager {
    dir: PathBuf,
    files: AHashMap<String, IndexFile>,
}

impl IndexManager {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            files: AHashMap::new(),
        }
    }

    fn file_path(&self, table_key: &str) -> PathBuf {
        self.dir.join(format!("{}.idx", table_key))
    }

    /// Open (or create) a table's index file and load its descriptors.
    pub fn open_table_file(&mut self, table: &str) -> IndexResult<()> {
        let key = table.to_lowercase();
        if self.files.contains_key(&key) {
            return Ok(());
        }
        let file = IndexFile::open(&self.file_path(&key))?;
        self.files.insert(key, file);
        Ok(())
    }

    /// Open the index files of every given table.
    pub fn load_all(&mut self, tables: &[String]) -> IndexResult<()> {
        for table in tables {
            self.open_table_file(table)?;
        }
        Ok(())
    }

    fn file_mut(&mut self, table: &str) -> IndexResult<&mut IndexFile> {
        let key = table.to_lowercase();
        self.open_table_file(table)?;
        self.files
            .get_mut(&key)
            .ok_or_else(|| IndexError::IndexNotFound {
                table: table.to_string(),
                column: String::new(),
            })
    }

    pub fn create_index(
        &mut self,
        table: &str,
        column: &str,
        key_type: FieldType,
    ) -> IndexResult<()> {
        let column = column.to_lowercase();
        self.file_mut(table)?.create_index(table, &column, key_type)
    }

    pub fn drop_index(&mut self, table: &str, column: &str) -> IndexResult<()> {
        let column = column.to_lowercase();
        self.file_mut(table)?.drop_index(table, &column)
    }

    pub fn insert(&mut self, table: &str, column: &str, key: Key, rid: Rid) -> IndexResult<()> {
        let column = column.to_lowercase();
        self.file_mut(table)?.insert(table, &column, key, rid)
    }

    pub fn delete(&mut self, table: &str, column: &str, key: &Key, rid: Rid) -> IndexResult<bool> {
        let column = column.to_lowercase();
        self.file_mut(table)?.delete(table, &column, key, rid)
    }

    pub fn search(&mut self, table: &str, column: &str, key: &Key) -> IndexResult<Vec<Rid>> {
        let column = column.to_lowercase();
        self.file_mut(table)?.search(table, &column, key)
    }

    pub fn range_scan(
        &mut self,
        table: &str,
        column: &str,
        min: Option<&Key>,
        max: Option<&Key>,
    ) -> IndexResult<Vec<(Key, Rid)>> {
        let column = column.to_lowercase();
        self.file_mut(table)?.range_scan(table, &column, min, max)
    }

    pub fn exists(&mut self, table: &str, column: &str, key: &Key) -> IndexResult<bool> {
        Ok(!self.search(table, column, key)?.is_empty())
    }

    /// Reject a key already present in the column's index. A no-op for
    /// unindexed columns.
    pub fn ensure_unique(&mut self, table: &str, column: &str, key: &Key) -> IndexResult<()> {
        let column = column.to_lowercase();
        self.file_mut(table)?.ensure_unique(table, &column, key)
    }

    pub fn has_index(&self, table: &str, column: &str) -> bool {
        self.files
            .get(&table.to_lowercase())
            .is_some_and(|f| f.trees.contains_key(&column.to_lowercase()))
    }

    pub fn key_type(&self, table: &str, column: &str) -> Option<FieldType> {
        self.files
            .get(&table.to_lowercase())?
            .trees
            .get(&column.to_lowercase())
            .map(|open| open.meta.key_type)
    }

    /// Every (table, column) pair with an open index, sorted.
    pub fn list_indexes(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (table, file) in &self.files {
            for column in file.trees.keys() {
                out.push((table.clone(), column.clone()));
            }
        }
        out.sort();
        out
    }

    /// Close and delete a dropped table's index file.
    pub fn drop_indexes_for_table(&mut self, table: &str) -> IndexResult<()> {
        let key = table.to_lowercase();
        if self.files.remove(&key).is_some() {
            std::fs::remove_file(self.file_path(&key)).map_err(crate::file::FileError::Io)?;
        }
        Ok(())
    }

    pub fn flush_all(&mut self) -> IndexResult<()> {
        for file in self.files.values_mut() {
            file.fm.flush()?;
        }
        Ok(())
    }
}
