use super::error::{StorageError, StorageResult};
use super::value::{FieldType, Value};

/// One column of a table schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: String, field_type: FieldType, nullable: bool) -> Self {
        Self {
            name,
            field_type,
            nullable,
        }
    }
}

/// A table's name and ordered column definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    table_name: String,
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(table_name: String, columns: Vec<Column>) -> Self {
        Self {
            table_name,
            columns,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Case-insensitive column lookup, returning its position and definition.
    pub fn find_column(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name.eq_ignore_ascii_case(name))
    }

    /// Check a row against this schema: arity, NOT NULL, and value types.
    pub fn validate(&self, values: &[Value]) -> StorageResult<()> {
        if values.len() != self.columns.len() {
            return Err(StorageError::SchemaMismatch(format!(
                "table {} has {} columns, record has {} values",
                self.table_name,
                self.columns.len(),
                values.len()
            )));
        }

        for (value, column) in values.iter().zip(&self.columns) {
            match value.field_type() {
                None => {
                    if !column.nullable {
                        return Err(StorageError::NullConstraintViolation(column.name.clone()));
                    }
                }
                Some(actual) => {
                    if actual != column.field_type {
                        return Err(StorageError::TypeMismatch {
                            expected: format!("{} for column {}", column.field_type, column.name),
                            actual: actual.to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Render the column list for the catalog:
    /// `name:TYPE:NULL|NOTNULL` joined with commas.
    pub fn definition_string(&self) -> String {
        self.columns
            .iter()
            .map(|c| {
                format!(
                    "{}:{}:{}",
                    c.name,
                    c.field_type.name(),
                    if c.nullable { "NULL" } else { "NOTNULL" }
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse a catalog definition string back into a schema.
    pub fn parse_definition(table_name: String, definition: &str) -> StorageResult<Self> {
        let mut columns = Vec::new();

        for part in definition.split(',') {
            let mut fields = part.split(':');
            let (name, type_name, null_marker) =
                match (fields.next(), fields.next(), fields.next(), fields.next()) {
                    (Some(n), Some(t), Some(m), None) if !n.is_empty() => (n, t, m),
                    _ => {
                        return Err(StorageError::Deserialization(format!(
                            "malformed column definition: {:?}",
                            part
                        )));
                    }
                };

            let field_type = FieldType::from_name(type_name).ok_or_else(|| {
                StorageError::Deserialization(format!("unknown column type: {:?}", type_name))
            })?;

            let nullable = match null_marker {
                "NULL" => true,
                "NOTNULL" => false,
                other => {
                    return Err(StorageError::Deserialization(format!(
                        "unknown null marker: {:?}",
                        other
                    )));
                }
            };

            columns.push(Column::new(name.to_string(), field_type, nullable));
        }

        Ok(Self::new(table_name, columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new(
            "orders".to_string(),
            vec![
                Column::new("id".to_string(), FieldType::Integer, false),
                Column::new("note".to_string(), FieldType::String, true),
                Column::new("total".to_string(), FieldType::Double, false),
            ],
        )
    }

    #[test]
    fn test_definition_round_trip() {
        let schema = sample();
        let definition = schema.definition_string();
        assert_eq!(definition, "id:INT:NOTNULL,note:STRING:NULL,total:DOUBLE:NOTNULL");

        let parsed = Schema::parse_definition("orders".to_string(), &definition).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Schema::parse_definition("t".to_string(), "id:INT").is_err());
        assert!(Schema::parse_definition("t".to_string(), "id:FLOAT:NULL").is_err());
        assert!(Schema::parse_definition("t".to_string(), "id:INT:MAYBE").is_err());
        assert!(Schema::parse_definition("t".to_string(), ":INT:NULL").is_err());
    }

    #[test]
    fn test_find_column_case_insensitive() {
        let schema = sample();
        let (idx, column) = schema.find_column("NOTE").unwrap();
        assert_eq!(idx, 1);
        assert_eq!(column.name, "note");
        assert!(schema.find_column("missing").is_none());
    }

    #[test]
    fn test_validate_type_mismatch() {
        let schema = sample();
        let result = schema.validate(&[
            Value::Integer(1),
            Value::Integer(2),
            Value::Double(3.0),
        ]);
        assert!(matches!(result, Err(StorageError::TypeMismatch { .. })));
    }

    #[test]
    fn test_validate_null_in_nullable_column() {
        let schema = sample();
        schema
            .validate(&[Value::Integer(1), Value::Null, Value::Double(3.0)])
            .unwrap();
    }
}
