//! Strata is a single-process, single-file database storage engine:
//! slotted 4KB pages, typed records with a page-0 catalog, and
//! disk-resident B+Tree secondary indexes.
//!
//! The layers stack bottom-up:
//! - `file`: paged file I/O and page allocation
//! - `storage`: slotted pages, records, schemas, and the table catalog
//! - `index`: B+Trees and per-table index files
//! - `db`: the `Database` facade keeping tables and indexes consistent

pub mod db;
pub mod file;
pub mod index;
pub mod storage;

pub use db::{Database, DbError, DbResult};
pub use file::{FileManager, PAGE_SIZE, PageId, PageType, SlotId};
pub use index::{BPlusTree, IndexManager, Key};
pub use storage::{Column, FieldType, Record, Rid, Schema, TableManager, Value};
