use std::cmp::Ordering;
use std::fmt;

use crate::storage::{FieldType, Value};

use super::error::{IndexError, IndexResult};

/// An index key: any non-null column value.
///
/// Keys of different types order by type tag first (Integer < String <
/// Boolean < Double), then by natural order within the type. Doubles use
/// IEEE total ordering so every key has a stable position.
#[derive(Debug, Clone)]
pub enum Key {
    Integer(i32),
    String(String),
    Boolean(bool),
    Double(f64),
}

impl Key {
    pub fn field_type(&self) -> FieldType {
        match self {
            Key::Integer(_) => FieldType::Integer,
            Key::String(_) => FieldType::String,
            Key::Boolean(_) => FieldType::Boolean,
            Key::Double(_) => FieldType::Double,
        }
    }

    fn type_tag(&self) -> u8 {
        self.field_type().as_u8()
    }

    /// Append the on-disk form: type tag, then the payload.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) -> IndexResult<()> {
        out.push(self.type_tag());
        match self {
            Key::Integer(v) => out.extend_from_slice(&v.to_le_bytes()),
            Key::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
            Key::Boolean(v) => out.push(*v as u8),
            Key::String(v) => {
                let bytes = v.as_bytes();
                if bytes.len() > u16::MAX as usize {
                    return Err(IndexError::Serialization(format!(
                        "string key of {} bytes exceeds the 2-byte length prefix",
                        bytes.len()
                    )));
                }
                out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                out.extend_from_slice(bytes);
            }
        }
        Ok(())
    }

    /// Decode one key, advancing `pos`.
    pub(crate) fn read_from(buffer: &[u8], pos: &mut usize) -> IndexResult<Self> {
        let short = || IndexError::Deserialization("key payload truncated".to_string());

        if *pos >= buffer.len() {
            return Err(short());
        }
        let tag = buffer[*pos];
        *pos += 1;

        match FieldType::from_u8(tag) {
            Some(FieldType::Integer) => {
                if buffer.len() - *pos < 4 {
                    return Err(short());
                }
                let v = i32::from_le_bytes([
                    buffer[*pos],
                    buffer[*pos + 1],
                    buffer[*pos + 2],
                    buffer[*pos + 3],
                ]);
                *pos += 4;
                Ok(Key::Integer(v))
            }
            Some(FieldType::Double) => {
                if buffer.len() - *pos < 8 {
                    return Err(short());
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buffer[*pos..*pos + 8]);
                *pos += 8;
                Ok(Key::Double(f64::from_le_bytes(raw)))
            }
            Some(FieldType::Boolean) => {
                if buffer.len() - *pos < 1 {
                    return Err(short());
                }
                let v = buffer[*pos] != 0;
                *pos += 1;
                Ok(Key::Boolean(v))
            }
            Some(FieldType::String) => {
                if buffer.len() - *pos < 2 {
                    return Err(short());
                }
                let len = u16::from_le_bytes([buffer[*pos], buffer[*pos + 1]]) as usize;
                *pos += 2;
                if buffer.len() - *pos < len {
                    return Err(short());
                }
                let text = std::str::from_utf8(&buffer[*pos..*pos + len])
                    .map_err(|e| IndexError::Deserialization(format!("invalid UTF-8: {}", e)))?
                    .to_string();
                *pos += len;
                Ok(Key::String(text))
            }
            None => Err(IndexError::Deserialization(format!(
                "unknown key type tag {}",
                tag
            ))),
        }
    }

    pub(crate) fn encoded_len(&self) -> usize {
        1 + match self {
            Key::Integer(_) => 4,
            Key::Double(_) => 8,
            Key::Boolean(_) => 1,
            Key::String(v) => 2 + v.len(),
        }
    }
}

impl TryFrom<&Value> for Key {
    type Error = IndexError;

    fn try_from(value: &Value) -> IndexResult<Self> {
        match value {
            Value::Null => Err(IndexError::NotIndexable),
            Value::Integer(v) => Ok(Key::Integer(*v)),
            Value::String(v) => Ok(Key::String(v.clone())),
            Value::Boolean(v) => Ok(Key::Boolean(*v)),
            Value::Double(v) => Ok(Key::Double(*v)),
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Integer(a), Key::Integer(b)) => a.cmp(b),
            (Key::String(a), Key::String(b)) => a.cmp(b),
            (Key::Boolean(a), Key::Boolean(b)) => a.cmp(b),
            (Key::Double(a), Key::Double(b)) => a.total_cmp(b),
            _ => self.type_tag().cmp(&other.type_tag()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Integer(v) => write!(f, "{}", v),
            Key::String(v) => write!(f, "{}", v),
            Key::Boolean(v) => write!(f, "{}", v),
            Key::Double(v) => write!(f, "{}", v),
        }
    }
}
