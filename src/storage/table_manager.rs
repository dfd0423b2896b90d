use ahash::AHashMap;

use crate::file::{FileManager, PageId, PageType};

use super::error::{StorageError, StorageResult};
use super::page::Page;
use super::record::{Record, Rid};
use super::schema::{Column, Schema};
use super::value::{FieldType, Value};

/// The catalog lives in page 0 as ordinary slotted records.
const CATALOG_PAGE: PageId = 0;

fn catalog_schema() -> Schema {
    Schema::new(
        "__catalog".to_string(),
        vec![
            Column::new("table".to_string(), FieldType::String, false),
            Column::new("columns".to_string(), FieldType::String, false),
            Column::new("pages".to_string(), FieldType::String, false),
        ],
    )
}

struct TableInfo {
    schema: Schema,
    pages: Vec<PageId>,
}

/// Manages table schemas, their data pages, and the page-0 catalog.
///
/// Table names are case-insensitive; keys are stored lowercased. Each
/// table's catalog entry is one record holding its name, its column
/// definition string, and its comma-separated page list.
pub struct TableManager {
    tables: AHashMap<String, TableInfo>,
}

impl TableManager {
    pub fn new() -> Self {
        Self {
            tables: AHashMap::new(),
        }
    }

    /// Rebuild the in-memory table map from the catalog page.
    pub fn load_catalog(&mut self, fm: &mut FileManager) -> StorageResult<()> {
        self.tables.clear();

        let page = Page::load(fm.read_page(CATALOG_PAGE)?)?;
        let schema = catalog_schema();

        for slot_id in 0..page.slot_count() {
            if !page.is_slot_live(slot_id) {
                continue;
            }
            let record = Record::from_bytes(&schema, &page.read_record(slot_id)?)?;
            let (name, definition, pages) = Self::unpack_catalog_record(&record)?;

            let table_schema = Schema::parse_definition(name.clone(), &definition)?;
            let page_ids = Self::parse_page_list(&pages)?;

            self.tables.insert(
                name.to_lowercase(),
                TableInfo {
                    schema: table_schema,
                    pages: page_ids,
                },
            );
        }

        Ok(())
    }

    fn unpack_catalog_record(record: &Record) -> StorageResult<(String, String, String)> {
        match record.values() {
            [Value::String(name), Value::String(columns), Value::String(pages)] => {
                Ok((name.clone(), columns.clone(), pages.clone()))
            }
            other => Err(StorageError::Deserialization(format!(
                "malformed catalog record: {:?}",
                other
            ))),
        }
    }

    fn parse_page_list(pages: &str) -> StorageResult<Vec<PageId>> {
        if pages.is_empty() {
            return Ok(Vec::new());
        }
        pages
            .split(',')
            .map(|p| {
                p.parse::<PageId>().map_err(|_| {
                    StorageError::Deserialization(format!("bad page id in catalog: {:?}", p))
                })
            })
            .collect()
    }

    fn format_page_list(pages: &[PageId]) -> String {
        pages
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Rewrite one table's catalog record: delete the old slot (if any),
    /// insert the new one. Vacuums the catalog page once before giving up.
    fn persist_table(&self, fm: &mut FileManager, key: &str) -> StorageResult<()> {
        let info = self
            .tables
            .get(key)
            .ok_or_else(|| StorageError::TableNotFound(key.to_string()))?;

        let schema = catalog_schema();
        let record = Record::new(vec![
            Value::String(info.schema.table_name().to_string()),
            Value::String(info.schema.definition_string()),
            Value::String(Self::format_page_list(&info.pages)),
        ]);
        let bytes = record.to_bytes(&schema)?;

        let mut page = Page::load(fm.read_page(CATALOG_PAGE)?)?;
        Self::delete_catalog_slot(&mut page, &schema, key)?;

        if page.try_insert_record(&bytes).is_none() {
            page.vacuum()?;
            if page.try_insert_record(&bytes).is_none() {
                return Err(StorageError::CatalogFull);
            }
        }

        fm.write_page(CATALOG_PAGE, page.bytes())?;
        Ok(())
    }

    fn delete_catalog_slot(page: &mut Page, schema: &Schema, key: &str) -> StorageResult<()> {
        for slot_id in 0..page.slot_count() {
            if !page.is_slot_live(slot_id) {
                continue;
            }
            let record = Record::from_bytes(schema, &page.read_record(slot_id)?)?;
            if let Some(Value::String(name)) = record.get(0) {
                if name.eq_ignore_ascii_case(key) {
                    page.delete_record(slot_id)?;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Create a table with one freshly allocated data page and persist
    /// its catalog entry.
    pub fn create_table(&mut self, fm: &mut FileManager, schema: Schema) -> StorageResult<()> {
        let key = schema.table_name().to_lowercase();
        if self.tables.contains_key(&key) {
            return Err(StorageError::TableAlreadyExists(
                schema.table_name().to_string(),
            ));
        }

        let first_page = fm.allocate_page(PageType::Data)?;
        self.tables.insert(
            key.clone(),
            TableInfo {
                schema,
                pages: vec![first_page],
            },
        );
        self.persist_table(fm, &key)
    }

    fn info(&self, table: &str) -> StorageResult<&TableInfo> {
        self.tables
            .get(&table.to_lowercase())
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))
    }

    /// Insert a record, first-fit across the table's existing pages.
    /// Allocates and registers a new page when none has room.
    pub fn insert(
        &mut self,
        fm: &mut FileManager,
        table: &str,
        record: &Record,
    ) -> StorageResult<Rid> {
        let key = table.to_lowercase();
        let (bytes, pages) = {
            let info = self.info(table)?;
            (record.to_bytes(&info.schema)?, info.pages.clone())
        };

        for page_id in pages {
            let mut page = Page::load(fm.read_page(page_id)?)?;
            if let Some(slot_id) = page.try_insert_record(&bytes) {
                fm.write_page(page_id, page.bytes())?;
                return Ok(Rid::new(page_id, slot_id));
            }
        }

        let page_id = fm.allocate_page(PageType::Data)?;
        if let Some(info) = self.tables.get_mut(&key) {
            info.pages.push(page_id);
        }
        self.persist_table(fm, &key)?;

        let mut page = Page::load(fm.read_page(page_id)?)?;
        let slot_id = page.try_insert_record(&bytes).ok_or_else(|| {
            StorageError::Serialization(format!("record of {} bytes exceeds page capacity", bytes.len()))
        })?;
        fm.write_page(page_id, page.bytes())?;

        Ok(Rid::new(page_id, slot_id))
    }

    /// Read one record by RID. Deleted or never-written slots read as
    /// `None` rather than an error.
    pub fn read(
        &self,
        fm: &mut FileManager,
        table: &str,
        rid: Rid,
    ) -> StorageResult<Option<Record>> {
        let info = self.info(table)?;
        if !info.pages.contains(&rid.page_id) {
            return Err(StorageError::RidNotInTable {
                table: table.to_string(),
                rid: rid.to_string(),
            });
        }

        let page = Page::load(fm.read_page(rid.page_id)?)?;
        match page.read_record(rid.slot_id) {
            Ok(bytes) => Ok(Some(Record::from_bytes(&info.schema, &bytes)?)),
            Err(StorageError::SlotEmpty { .. }) | Err(StorageError::SlotOutOfRange { .. }) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete one record by RID. Returns false when the slot was already
    /// empty.
    pub fn delete(&self, fm: &mut FileManager, table: &str, rid: Rid) -> StorageResult<bool> {
        let info = self.info(table)?;
        if !info.pages.contains(&rid.page_id) {
            return Err(StorageError::RidNotInTable {
                table: table.to_string(),
                rid: rid.to_string(),
            });
        }

        let mut page = Page::load(fm.read_page(rid.page_id)?)?;
        if !page.is_slot_live(rid.slot_id) {
            return Ok(false);
        }

        page.delete_record(rid.slot_id)?;
        fm.write_page(rid.page_id, page.bytes())?;
        Ok(true)
    }

    /// All live records in page order, then slot order within each page.
    pub fn select_all(
        &self,
        fm: &mut FileManager,
        table: &str,
    ) -> StorageResult<Vec<(Rid, Record)>> {
        let info = self.info(table)?;
        let mut rows = Vec::new();

        for &page_id in &info.pages {
            let page = Page::load(fm.read_page(page_id)?)?;
            for slot_id in 0..page.slot_count() {
                if !page.is_slot_live(slot_id) {
                    continue;
                }
                let record = Record::from_bytes(&info.schema, &page.read_record(slot_id)?)?;
                rows.push((Rid::new(page_id, slot_id), record));
            }
        }

        Ok(rows)
    }

    pub fn get_schema(&self, table: &str) -> Option<&Schema> {
        self.tables.get(&table.to_lowercase()).map(|i| &i.schema)
    }

    pub fn get_pages(&self, table: &str) -> Option<&[PageId]> {
        self.tables
            .get(&table.to_lowercase())
            .map(|i| i.pages.as_slice())
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.tables.contains_key(&table.to_lowercase())
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop a table: remove its catalog record and mark its data pages
    /// Free. Page IDs are never recycled, so the space is simply retired.
    pub fn drop_table(&mut self, fm: &mut FileManager, table: &str) -> StorageResult<()> {
        let key = table.to_lowercase();
        let info = self
            .tables
            .remove(&key)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;

        let schema = catalog_schema();
        let mut page = Page::load(fm.read_page(CATALOG_PAGE)?)?;
        Self::delete_catalog_slot(&mut page, &schema, &key)?;
        fm.write_page(CATALOG_PAGE, page.bytes())?;

        for page_id in info.pages {
            let mut freed = Page::new(page_id, PageType::Free);
            fm.write_page(page_id, freed.bytes())?;
        }

        Ok(())
    }

    /// Compact every data page of one table.
    pub fn vacuum_table(&self, fm: &mut FileManager, table: &str) -> StorageResult<()> {
        let info = self.info(table)?;
        for &page_id in &info.pages {
            let mut page = Page::load(fm.read_page(page_id)?)?;
            page.vacuum()?;
            fm.write_page(page_id, page.bytes())?;
        }
        Ok(())
    }

    pub fn vacuum_all(&self, fm: &mut FileManager) -> StorageResult<()> {
        for table in self.list_tables() {
            self.vacuum_table(fm, &table)?;
        }
        Ok(())
    }
}

impl Default for TableManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileManager, TableManager) {
        let temp_dir = tempfile::tempdir().unwrap();
        let fm = FileManager::open_or_create(temp_dir.path().join("test.db")).unwrap();
        (temp_dir, fm, TableManager::new())
    }

    fn users_schema() -> Schema {
        Schema::new(
            "users".to_string(),
            vec![
                Column::new("id".to_string(), FieldType::Integer, false),
                Column::new("name".to_string(), FieldType::String, true),
            ],
        )
    }

    fn user(id: i32, name: &str) -> Record {
        Record::new(vec![
            Value::Integer(id),
            Value::String(name.to_string()),
        ])
    }

    #[test]
    fn test_create_insert_read() {
        let (_dir, mut fm, mut tm) = setup();
        tm.create_table(&mut fm, users_schema()).unwrap();

        let rid = tm.insert(&mut fm, "users", &user(1, "ada")).unwrap();
        let record = tm.read(&mut fm, "users", rid).unwrap().unwrap();
        assert_eq!(record, user(1, "ada"));
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let (_dir, mut fm, mut tm) = setup();
        tm.create_table(&mut fm, users_schema()).unwrap();

        let result = tm.create_table(&mut fm, users_schema());
        assert!(matches!(result, Err(StorageError::TableAlreadyExists(_))));
    }

    #[test]
    fn test_table_names_case_insensitive() {
        let (_dir, mut fm, mut tm) = setup();
        tm.create_table(&mut fm, users_schema()).unwrap();

        assert!(tm.table_exists("USERS"));
        tm.insert(&mut fm, "Users", &user(1, "ada")).unwrap();
        assert_eq!(tm.select_all(&mut fm, "uSeRs").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_and_reread() {
        let (_dir, mut fm, mut tm) = setup();
        tm.create_table(&mut fm, users_schema()).unwrap();

        let rid = tm.insert(&mut fm, "users", &user(1, "ada")).unwrap();
        assert!(tm.delete(&mut fm, "users", rid).unwrap());
        assert!(!tm.delete(&mut fm, "users", rid).unwrap());
        assert!(tm.read(&mut fm, "users", rid).unwrap().is_none());
    }

    #[test]
    fn test_rid_from_other_table_rejected() {
        let (_dir, mut fm, mut tm) = setup();
        tm.create_table(&mut fm, users_schema()).unwrap();
        tm.create_table(
            &mut fm,
            Schema::new(
                "other".to_string(),
                vec![Column::new("x".to_string(), FieldType::Integer, false)],
            ),
        )
        .unwrap();

        let rid = tm.insert(&mut fm, "users", &user(1, "ada")).unwrap();
        let result = tm.read(&mut fm, "other", rid);
        assert!(matches!(result, Err(StorageError::RidNotInTable { .. })));
    }

    #[test]
    fn test_catalog_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test.db");

        let rid = {
            let mut fm = FileManager::open_or_create(&path).unwrap();
            let mut tm = TableManager::new();
            tm.create_table(&mut fm, users_schema()).unwrap();
            let rid = tm.insert(&mut fm, "users", &user(9, "grace")).unwrap();
            fm.flush().unwrap();
            rid
        };

        let mut fm = FileManager::open_or_create(&path).unwrap();
        let mut tm = TableManager::new();
        tm.load_catalog(&mut fm).unwrap();

        assert_eq!(tm.get_schema("users"), Some(&users_schema()));
        let record = tm.read(&mut fm, "users", rid).unwrap().unwrap();
        assert_eq!(record, user(9, "grace"));
    }

    #[test]
    fn test_large_insert_spans_pages() {
        let (_dir, mut fm, mut tm) = setup();
        tm.create_table(&mut fm, users_schema()).unwrap();

        for i in 0..2000 {
            tm.insert(&mut fm, "users", &user(i, "row-payload-padding"))
                .unwrap();
        }

        assert!(tm.get_pages("users").unwrap().len() >= 2);

        let rows = tm.select_all(&mut fm, "users").unwrap();
        assert_eq!(rows.len(), 2000);
        for (i, (_, record)) in rows.iter().enumerate() {
            assert_eq!(record.get(0), Some(&Value::Integer(i as i32)));
        }
    }

    #[test]
    fn test_select_all_skips_deleted() {
        let (_dir, mut fm, mut tm) = setup();
        tm.create_table(&mut fm, users_schema()).unwrap();

        let rids: Vec<Rid> = (0..10)
            .map(|i| tm.insert(&mut fm, "users", &user(i, "x")).unwrap())
            .collect();
        tm.delete(&mut fm, "users", rids[3]).unwrap();
        tm.delete(&mut fm, "users", rids[7]).unwrap();

        let rows = tm.select_all(&mut fm, "users").unwrap();
        assert_eq!(rows.len(), 8);
        assert!(rows.iter().all(|(rid, _)| *rid != rids[3] && *rid != rids[7]));
    }

    #[test]
    fn test_drop_table_frees_pages() {
        let (_dir, mut fm, mut tm) = setup();
        tm.create_table(&mut fm, users_schema()).unwrap();
        let pages = tm.get_pages("users").unwrap().to_vec();

        tm.drop_table(&mut fm, "users").unwrap();
        assert!(!tm.table_exists("users"));

        for page_id in pages {
            let page = Page::load(fm.read_page(page_id).unwrap()).unwrap();
            assert_eq!(page.page_type(), PageType::Free);
        }

        // catalog entry is gone after reopen of the map
        tm.load_catalog(&mut fm).unwrap();
        assert!(!tm.table_exists("users"));
    }

    #[test]
    fn test_vacuum_then_insert_reuses_space() {
        let (_dir, mut fm, mut tm) = setup();
        tm.create_table(&mut fm, users_schema()).unwrap();

        let big = "y".repeat(1500);
        let rids: Vec<Rid> = (0..2)
            .map(|i| {
                tm.insert(
                    &mut fm,
                    "users",
                    &Record::new(vec![Value::Integer(i), Value::String(big.clone())]),
                )
                .unwrap()
            })
            .collect();
        // both fit on the first data page
        assert_eq!(rids[0].page_id, rids[1].page_id);

        tm.delete(&mut fm, "users", rids[0]).unwrap();
        tm.vacuum_table(&mut fm, "users").unwrap();

        let rid = tm
            .insert(
                &mut fm,
                "users",
                &Record::new(vec![Value::Integer(2), Value::String(big.clone())]),
            )
            .unwrap();
        assert_eq!(rid.page_id, rids[0].page_id);
        assert_eq!(rid.slot_id, rids[0].slot_id);
    }
}
