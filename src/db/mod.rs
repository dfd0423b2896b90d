mod error;

#[cfg(test)]
mod tests;

pub use error::{DbError, DbResult};

use std::path::{Path, PathBuf};

use crate::file::{FileManager, PageId};
use crate::index::{IndexManager, Key};
use crate::storage::{Record, Rid, Schema, StorageError, TableManager, Value};

/// Top-level handle over one database: a single data file plus one index
/// file per table, all living in the same directory.
///
/// Writes keep tables and indexes in step: inserts check unique
/// constraints before touching the data file, deletes scrub the indexes
/// of every key the removed record carried.
pub struct Database {
    name: String,
    dir: PathBuf,
    fm: FileManager,
    tables: TableManager,
    indexes: IndexManager,
}

impl Database {
    /// Open (or create) the database `<name>.db` under `dir`, loading the
    /// catalog and every table's index file.
    pub fn open<P: AsRef<Path>>(dir: P, name: &str) -> DbResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut fm = FileManager::open_or_create(dir.join(format!("{}.db", name)))?;

        let mut tables = TableManager::new();
        tables.load_catalog(&mut fm)?;

        let mut indexes = IndexManager::new(&dir);
        indexes.load_all(&tables.list_tables())?;

        Ok(Self {
            name: name.to_string(),
            dir,
            fm,
            tables,
            indexes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn create_table(&mut self, schema: Schema) -> DbResult<()> {
        self.tables.create_table(&mut self.fm, schema)?;
        Ok(())
    }

    /// Drop a table, its catalog entry, and its index file.
    pub fn drop_table(&mut self, table: &str) -> DbResult<()> {
        self.tables.drop_table(&mut self.fm, table)?;
        self.indexes.drop_indexes_for_table(table)?;
        Ok(())
    }

    fn schema(&self, table: &str) -> DbResult<Schema> {
        self.tables
            .get_schema(table)
            .cloned()
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()).into())
    }

    /// The (column, key) pairs of a record that have an index to maintain.
    /// NULL values are never indexed.
    fn indexed_keys(&self, table: &str, schema: &Schema, record: &Record) -> DbResult<Vec<(String, Key)>> {
        let mut keys = Vec::new();
        for (i, column) in schema.columns().iter().enumerate() {
            if !self.indexes.has_index(table, &column.name) {
                continue;
            }
            if let Some(value) = record.get(i) {
                if !value.is_null() {
                    keys.push((column.name.clone(), Key::try_from(value)?));
                }
            }
        }
        Ok(keys)
    }

    /// Insert one record: validate, check unique constraints, write the
    /// row, then maintain every index on the table.
    pub fn insert(&mut self, table: &str, record: Record) -> DbResult<Rid> {
        let schema = self.schema(table)?;
        schema.validate(record.values())?;

        let keys = self.indexed_keys(table, &schema, &record)?;
        for (column, key) in &keys {
            self.indexes.ensure_unique(table, column, key)?;
        }

        let rid = self.tables.insert(&mut self.fm, table, &record)?;
        for (column, key) in keys {
            self.indexes.insert(table, &column, key, rid)?;
        }

        Ok(rid)
    }

    pub fn read(&mut self, table: &str, rid: Rid) -> DbResult<Option<Record>> {
        Ok(self.tables.read(&mut self.fm, table, rid)?)
    }

    /// Delete one record by RID, scrubbing its keys from every index.
    /// Returns false when the slot was already empty.
    pub fn delete(&mut self, table: &str, rid: Rid) -> DbResult<bool> {
        let schema = self.schema(table)?;
        let Some(record) = self.tables.read(&mut self.fm, table, rid)? else {
            return Ok(false);
        };

        let deleted = self.tables.delete(&mut self.fm, table, rid)?;
        if deleted {
            for (column, key) in self.indexed_keys(table, &schema, &record)? {
                self.indexes.delete(table, &column, &key, rid)?;
            }
        }
        Ok(deleted)
    }

    pub fn select_all(&mut self, table: &str) -> DbResult<Vec<(Rid, Record)>> {
        Ok(self.tables.select_all(&mut self.fm, table)?)
    }

    /// Create an index on an existing column and backfill it from the
    /// table's current rows.
    pub fn create_index(&mut self, table: &str, column: &str) -> DbResult<()> {
        let schema = self.schema(table)?;
        let (position, definition) =
            schema
                .find_column(column)
                .ok_or_else(|| DbError::ColumnNotFound {
                    table: table.to_string(),
                    column: column.to_string(),
                })?;
        let key_type = definition.field_type;
        let column = definition.name.clone();

        self.indexes.create_index(table, &column, key_type)?;

        for (rid, record) in self.tables.select_all(&mut self.fm, table)? {
            if let Some(value) = record.get(position) {
                if !value.is_null() {
                    self.indexes
                        .insert(table, &column, Key::try_from(value)?, rid)?;
                }
            }
        }
        Ok(())
    }

    pub fn drop_index(&mut self, table: &str, column: &str) -> DbResult<()> {
        self.indexes.drop_index(table, column)?;
        Ok(())
    }

    /// Point lookup through an index, returning the live matching rows.
    pub fn search(&mut self, table: &str, column: &str, value: &Value) -> DbResult<Vec<(Rid, Record)>> {
        let key = Key::try_from(value)?;
        let rids = self.indexes.search(table, column, &key)?;

        let mut rows = Vec::with_capacity(rids.len());
        for rid in rids {
            if let Some(record) = self.tables.read(&mut self.fm, table, rid)? {
                rows.push((rid, record));
            }
        }
        Ok(rows)
    }

    /// Index range scan with inclusive bounds; `None` is an open end.
    pub fn range_scan(
        &mut self,
        table: &str,
        column: &str,
        min: Option<&Value>,
        max: Option<&Value>,
    ) -> DbResult<Vec<(Rid, Record)>> {
        let min_key = min.map(Key::try_from).transpose()?;
        let max_key = max.map(Key::try_from).transpose()?;
        let pairs =
            self.indexes
                .range_scan(table, column, min_key.as_ref(), max_key.as_ref())?;

        let mut rows = Vec::with_capacity(pairs.len());
        for (_, rid) in pairs {
            if let Some(record) = self.tables.read(&mut self.fm, table, rid)? {
                rows.push((rid, record));
            }
        }
        Ok(rows)
    }

    pub fn get_schema(&self, table: &str) -> Option<&Schema> {
        self.tables.get_schema(table)
    }

    pub fn get_pages(&self, table: &str) -> Option<&[PageId]> {
        self.tables.get_pages(table)
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.tables.table_exists(table)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.tables.list_tables()
    }

    pub fn has_index(&self, table: &str, column: &str) -> bool {
        self.indexes.has_index(table, column)
    }

    pub fn list_indexes(&self) -> Vec<(String, String)> {
        self.indexes.list_indexes()
    }

    /// Compact every data page of every table.
    pub fn vacuum_all(&mut self) -> DbResult<()> {
        self.tables.vacuum_all(&mut self.fm)?;
        Ok(())
    }

    pub fn flush(&mut self) -> DbResult<()> {
        self.fm.flush()?;
        self.indexes.flush_all()?;
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
