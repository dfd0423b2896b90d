use tempfile::TempDir;

use crate::index::IndexError;
use crate::storage::{Column, FieldType, Record, Schema, StorageError, Value};

use super::{Database, DbError};

fn setup() -> (TempDir, Database) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db = Database::open(temp_dir.path(), "test").unwrap();
    (temp_dir, db)
}

fn users_schema() -> Schema {
    Schema::new(
        "users".to_string(),
        vec![
            Column::new("id".to_string(), FieldType::Integer, false),
            Column::new("name".to_string(), FieldType::String, true),
            Column::new("score".to_string(), FieldType::Double, true),
        ],
    )
}

fn user(id: i32, name: &str, score: f64) -> Record {
    Record::new(vec![
        Value::Integer(id),
        Value::String(name.to_string()),
        Value::Double(score),
    ])
}

#[test]
fn test_insert_and_select() {
    let (_dir, mut db) = setup();
    db.create_table(users_schema()).unwrap();

    db.insert("users", user(1, "ada", 9.5)).unwrap();
    db.insert("users", user(2, "grace", 8.0)).unwrap();

    let rows = db.select_all("users").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].1, user(1, "ada", 9.5));
}

#[test]
fn test_indexed_insert_and_search() {
    let (_dir, mut db) = setup();
    db.create_table(users_schema()).unwrap();
    db.create_index("users", "id").unwrap();

    let rid = db.insert("users", user(7, "alan", 6.5)).unwrap();

    let rows = db.search("users", "id", &Value::Integer(7)).unwrap();
    assert_eq!(rows, vec![(rid, user(7, "alan", 6.5))]);
    assert!(db.search("users", "id", &Value::Integer(8)).unwrap().is_empty());
}

#[test]
fn test_unique_constraint_on_indexed_column() {
    let (_dir, mut db) = setup();
    db.create_table(users_schema()).unwrap();
    db.create_index("users", "id").unwrap();

    db.insert("users", user(1, "ada", 9.5)).unwrap();
    let result = db.insert("users", user(1, "imposter", 0.0));
    assert!(matches!(
        result,
        Err(DbError::Index(IndexError::UniqueViolation { .. }))
    ));

    // the rejected row must not have reached the table either
    assert_eq!(db.select_all("users").unwrap().len(), 1);
}

#[test]
fn test_delete_scrubs_indexes() {
    let (_dir, mut db) = setup();
    db.create_table(users_schema()).unwrap();
    db.create_index("users", "id").unwrap();

    let rid = db.insert("users", user(1, "ada", 9.5)).unwrap();
    assert!(db.delete("users", rid).unwrap());

    assert!(db.search("users", "id", &Value::Integer(1)).unwrap().is_empty());
    // the key is free again
    db.insert("users", user(1, "ada-again", 9.5)).unwrap();
}

#[test]
fn test_create_index_backfills_existing_rows() {
    let (_dir, mut db) = setup();
    db.create_table(users_schema()).unwrap();

    for i in 0..50 {
        db.insert("users", user(i, "bulk", i as f64)).unwrap();
    }
    db.create_index("users", "id").unwrap();

    let rows = db.search("users", "id", &Value::Integer(31)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1, user(31, "bulk", 31.0));
}

#[test]
fn test_null_values_skip_the_index() {
    let (_dir, mut db) = setup();
    db.create_table(users_schema()).unwrap();
    db.create_index("users", "name").unwrap();

    db.insert(
        "users",
        Record::new(vec![Value::Integer(1), Value::Null, Value::Null]),
    )
    .unwrap();
    db.insert(
        "users",
        Record::new(vec![Value::Integer(2), Value::Null, Value::Null]),
    )
    .unwrap();

    // two NULL names do not collide, and neither is searchable
    let result = db.search("users", "name", &Value::Null);
    assert!(matches!(
        result,
        Err(DbError::Index(IndexError::NotIndexable))
    ));
    assert_eq!(db.select_all("users").unwrap().len(), 2);
}

#[test]
fn test_range_scan_returns_rows_in_key_order() {
    let (_dir, mut db) = setup();
    db.create_table(users_schema()).unwrap();
    db.create_index("users", "id").unwrap();

    for i in [5, 3, 8, 1, 9, 2, 7, 4, 6, 0] {
        db.insert("users", user(i, "scan", 0.0)).unwrap();
    }

    let rows = db
        .range_scan(
            "users",
            "id",
            Some(&Value::Integer(3)),
            Some(&Value::Integer(7)),
        )
        .unwrap();
    let ids: Vec<&Value> = rows.iter().map(|(_, r)| r.get(0).unwrap()).collect();
    assert_eq!(
        ids,
        vec![
            &Value::Integer(3),
            &Value::Integer(4),
            &Value::Integer(5),
            &Value::Integer(6),
            &Value::Integer(7),
        ]
    );
}

#[test]
fn test_reopen_preserves_everything() {
    let temp_dir = tempfile::tempdir().unwrap();

    {
        let mut db = Database::open(temp_dir.path(), "test").unwrap();
        db.create_table(users_schema()).unwrap();
        db.create_index("users", "id").unwrap();
        for i in 0..100 {
            db.insert("users", user(i, "persisted", 1.0)).unwrap();
        }
        // Drop flushes
    }

    let mut db = Database::open(temp_dir.path(), "test").unwrap();
    assert!(db.table_exists("users"));
    assert!(db.has_index("users", "id"));

    assert_eq!(db.select_all("users").unwrap().len(), 100);
    let rows = db.search("users", "id", &Value::Integer(64)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1, user(64, "persisted", 1.0));

    // unique constraint still holds after reopen
    let result = db.insert("users", user(64, "dup", 0.0));
    assert!(matches!(
        result,
        Err(DbError::Index(IndexError::UniqueViolation { .. }))
    ));
}

#[test]
fn test_drop_table_drops_indexes() {
    let (dir, mut db) = setup();
    db.create_table(users_schema()).unwrap();
    db.create_index("users", "id").unwrap();
    db.insert("users", user(1, "ada", 9.5)).unwrap();

    db.drop_table("users").unwrap();
    assert!(!db.table_exists("users"));
    assert!(!db.has_index("users", "id"));
    assert!(!dir.path().join("users.idx").exists());

    let result = db.select_all("users");
    assert!(matches!(
        result,
        Err(DbError::Storage(StorageError::TableNotFound(_)))
    ));
}

#[test]
fn test_column_not_found() {
    let (_dir, mut db) = setup();
    db.create_table(users_schema()).unwrap();

    let result = db.create_index("users", "missing");
    assert!(matches!(result, Err(DbError::ColumnNotFound { .. })));
}

#[test]
fn test_vacuum_keeps_rows_and_indexes_aligned() {
    let (_dir, mut db) = setup();
    db.create_table(users_schema()).unwrap();
    db.create_index("users", "id").unwrap();

    let rids: Vec<_> = (0..20)
        .map(|i| db.insert("users", user(i, "churn", 0.0)).unwrap())
        .collect();
    for rid in rids.iter().step_by(2) {
        db.delete("users", *rid).unwrap();
    }
    db.vacuum_all().unwrap();

    // vacuum compacts in place and never moves RIDs
    assert_eq!(db.select_all("users").unwrap().len(), 10);
    let rows = db.search("users", "id", &Value::Integer(7)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, rids[7]);
}
