use std::fmt;

use crate::file::{PageId, SlotId};

use super::error::{StorageError, StorageResult};
use super::schema::Schema;
use super::value::Value;

/// Record identifier: physical address of a record as (page, slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl Rid {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot_id)
    }
}

/// One row of a table, positionally matching its schema's columns.
///
/// Wire format: a null bitmap of `ceil(columns / 8)` bytes (bit i set when
/// column i is NULL, LSB first within each byte), followed by the payloads
/// of the non-null columns in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialize against a schema. Validates arity, types, and NOT NULL
    /// constraints before writing a single byte.
    pub fn to_bytes(&self, schema: &Schema) -> StorageResult<Vec<u8>> {
        schema.validate(&self.values)?;

        let columns = schema.columns();
        let bitmap_len = columns.len().div_ceil(8);
        let mut out = vec![0u8; bitmap_len];

        for (i, value) in self.values.iter().enumerate() {
            if value.is_null() {
                out[i / 8] |= 1 << (i % 8);
            }
        }

        for (value, column) in self.values.iter().zip(columns) {
            if !value.is_null() {
                value.write_to(&mut out, column.field_type)?;
            }
        }

        Ok(out)
    }

    /// Decode a record previously written with `to_bytes` under the same
    /// schema. Trailing garbage is treated as corruption.
    pub fn from_bytes(schema: &Schema, buffer: &[u8]) -> StorageResult<Self> {
        let columns = schema.columns();
        let bitmap_len = columns.len().div_ceil(8);
        if buffer.len() < bitmap_len {
            return Err(StorageError::Deserialization(
                "record shorter than its null bitmap".to_string(),
            ));
        }

        let mut pos = bitmap_len;
        let mut values = Vec::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            let is_null = buffer[i / 8] & (1 << (i % 8)) != 0;
            if is_null {
                values.push(Value::Null);
            } else {
                values.push(Value::read_from(buffer, &mut pos, column.field_type)?);
            }
        }

        if pos != buffer.len() {
            return Err(StorageError::Deserialization(format!(
                "{} trailing bytes after record payload",
                buffer.len() - pos
            )));
        }

        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::Column;
    use crate::storage::value::FieldType;

    fn test_schema() -> Schema {
        Schema::new(
            "users".to_string(),
            vec![
                Column::new("id".to_string(), FieldType::Integer, false),
                Column::new("name".to_string(), FieldType::String, true),
                Column::new("active".to_string(), FieldType::Boolean, false),
                Column::new("score".to_string(), FieldType::Double, true),
            ],
        )
    }

    #[test]
    fn test_round_trip() {
        let schema = test_schema();
        let record = Record::new(vec![
            Value::Integer(42),
            Value::String("ada".to_string()),
            Value::Boolean(true),
            Value::Double(99.5),
        ]);

        let bytes = record.to_bytes(&schema).unwrap();
        let decoded = Record::from_bytes(&schema, &bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_null_columns_cost_no_payload() {
        let schema = test_schema();
        let with_nulls = Record::new(vec![
            Value::Integer(1),
            Value::Null,
            Value::Boolean(false),
            Value::Null,
        ]);

        let bytes = with_nulls.to_bytes(&schema).unwrap();
        // 1 bitmap byte + 4 (int) + 1 (bool)
        assert_eq!(bytes.len(), 6);

        let decoded = Record::from_bytes(&schema, &bytes).unwrap();
        assert_eq!(decoded, with_nulls);
    }

    #[test]
    fn test_not_null_violation() {
        let schema = test_schema();
        let record = Record::new(vec![
            Value::Null,
            Value::Null,
            Value::Boolean(true),
            Value::Null,
        ]);

        let result = record.to_bytes(&schema);
        assert!(matches!(
            result,
            Err(StorageError::NullConstraintViolation(_))
        ));
    }

    #[test]
    fn test_arity_mismatch() {
        let schema = test_schema();
        let record = Record::new(vec![Value::Integer(1)]);

        let result = record.to_bytes(&schema);
        assert!(matches!(result, Err(StorageError::SchemaMismatch(_))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let schema = test_schema();
        let record = Record::new(vec![
            Value::Integer(7),
            Value::Null,
            Value::Boolean(true),
            Value::Null,
        ]);

        let mut bytes = record.to_bytes(&schema).unwrap();
        bytes.push(0xEE);

        let result = Record::from_bytes(&schema, &bytes);
        assert!(matches!(result, Err(StorageError::Deserialization(_))));
    }

    #[test]
    fn test_rid_display() {
        assert_eq!(Rid::new(3, 12).to_string(), "(3, 12)");
    }
}
