use std::fmt;

use super::error::{StorageError, StorageResult};

/// Column type tags as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Integer = 0,
    String = 1,
    Boolean = 2,
    Double = 3,
}

impl FieldType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(FieldType::Integer),
            1 => Some(FieldType::String),
            2 => Some(FieldType::Boolean),
            3 => Some(FieldType::Double),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Name used in catalog definition strings.
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Integer => "INT",
            FieldType::String => "STRING",
            FieldType::Boolean => "BOOL",
            FieldType::Double => "DOUBLE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "INT" => Some(FieldType::Integer),
            "STRING" => Some(FieldType::String),
            "BOOL" => Some(FieldType::Boolean),
            "DOUBLE" => Some(FieldType::Double),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cell of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i32),
    String(String),
    Boolean(bool),
    Double(f64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The field type this value satisfies; `None` for NULL, which
    /// satisfies any nullable column.
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(FieldType::Integer),
            Value::String(_) => Some(FieldType::String),
            Value::Boolean(_) => Some(FieldType::Boolean),
            Value::Double(_) => Some(FieldType::Double),
        }
    }

    /// Append this value's payload bytes for a column of the given type.
    /// NULL is handled by the record's null bitmap and never reaches here.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>, field_type: FieldType) -> StorageResult<()> {
        match (self, field_type) {
            (Value::Integer(v), FieldType::Integer) => out.extend_from_slice(&v.to_le_bytes()),
            (Value::Double(v), FieldType::Double) => out.extend_from_slice(&v.to_le_bytes()),
            (Value::Boolean(v), FieldType::Boolean) => out.push(*v as u8),
            (Value::String(v), FieldType::String) => {
                let bytes = v.as_bytes();
                if bytes.len() > u16::MAX as usize {
                    return Err(StorageError::Serialization(format!(
                        "string of {} bytes exceeds the 2-byte length prefix",
                        bytes.len()
                    )));
                }
                out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            _ => {
                return Err(StorageError::TypeMismatch {
                    expected: field_type.to_string(),
                    actual: format!("{:?}", self),
                });
            }
        }
        Ok(())
    }

    /// Decode one value of the given type, advancing `pos`.
    pub(crate) fn read_from(
        buffer: &[u8],
        pos: &mut usize,
        field_type: FieldType,
    ) -> StorageResult<Self> {
        let remaining = buffer.len() - *pos;
        let short = || StorageError::Deserialization("record payload truncated".to_string());

        match field_type {
            FieldType::Integer => {
                if remaining < 4 {
                    return Err(short());
                }
                let v = i32::from_le_bytes([
                    buffer[*pos],
                    buffer[*pos + 1],
                    buffer[*pos + 2],
                    buffer[*pos + 3],
                ]);
                *pos += 4;
                Ok(Value::Integer(v))
            }
            FieldType::Double => {
                if remaining < 8 {
                    return Err(short());
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buffer[*pos..*pos + 8]);
                *pos += 8;
                Ok(Value::Double(f64::from_le_bytes(raw)))
            }
            FieldType::Boolean => {
                if remaining < 1 {
                    return Err(short());
                }
                let v = buffer[*pos] != 0;
                *pos += 1;
                Ok(Value::Boolean(v))
            }
            FieldType::String => {
                if remaining < 2 {
                    return Err(short());
                }
                let len = u16::from_le_bytes([buffer[*pos], buffer[*pos + 1]]) as usize;
                *pos += 2;
                if buffer.len() - *pos < len {
                    return Err(short());
                }
                let text = std::str::from_utf8(&buffer[*pos..*pos + len])
                    .map_err(|e| StorageError::Deserialization(format!("invalid UTF-8: {}", e)))?
                    .to_string();
                *pos += len;
                Ok(Value::String(text))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
        }
    }
}
