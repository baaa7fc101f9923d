//! Column values and the field-to-column mapping
//!
//! | Field | Column type | Stored as |
//! |-------|-------------|-----------|
//! | Text, Trimmed, Choice, Pattern | `TEXT` | text |
//! | Integer, Timestamp | `INTEGER` | integer |
//! | Float | `REAL` | real |
//! | Boolean | `BOOLEAN` | bool |
//! | Decimal | `INTEGER` | count of the smallest unit (`12.34` is `1234`), exact and ordered |
//! | Date, DateTime | `TEXT` | fixed-width ISO text, so text order is time order |
//! | Binary | `BLOB` | bytes |
//! | List | `TEXT` | JSON array of the wire form |

use crate::error::SqlError;
use vstore_core::{Field, ValidationError, Value};

/// A single bound parameter or returned column
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Integer(i64),
    /// Double
    Real(f64),
    /// Text
    Text(String),
    /// Bytes
    Blob(Vec<u8>),
}

impl SqlValue {
    /// True for `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

/// Column type used in `CREATE TABLE` for this field
pub fn column_type(field: &Field) -> &'static str {
    match field.inner() {
        Field::Integer(_) | Field::Timestamp | Field::Decimal { .. } => "INTEGER",
        Field::Float(_) => "REAL",
        Field::Boolean => "BOOLEAN",
        Field::Binary => "BLOB",
        _ => "TEXT",
    }
}

/// Map a validated value to its column value
pub fn to_sql(column: &str, field: &Field, value: &Value) -> Result<SqlValue, SqlError> {
    encode(field, value).map_err(|source| SqlError::Encode {
        column: column.to_string(),
        source,
    })
}

/// Map a column value back to a validated value
pub fn from_sql(column: &str, field: &Field, value: SqlValue) -> Result<Value, SqlError> {
    decode(field, value).map_err(|source| SqlError::Decode {
        column: column.to_string(),
        source,
    })
}

fn encode(field: &Field, value: &Value) -> Result<SqlValue, ValidationError> {
    match (field, value) {
        (Field::Nullable(_), Value::Null) => Ok(SqlValue::Null),
        (Field::Nullable(inner), v) => encode(inner, v),
        (Field::List(_), Value::List(_)) => {
            let wire = field.serialize(value)?;
            Ok(SqlValue::Text(wire.to_string()))
        }
        (Field::Integer(_) | Field::Timestamp, Value::Int(v)) => Ok(SqlValue::Integer(*v)),
        (Field::Float(_), Value::Float(v)) => Ok(SqlValue::Real(*v)),
        (Field::Boolean, Value::Bool(b)) => Ok(SqlValue::Bool(*b)),
        (Field::Decimal { .. }, v) => field.to_scaled(v).map(SqlValue::Integer),
        (Field::Binary, Value::Bytes(b)) => Ok(SqlValue::Blob(b.clone())),
        (field, v) => field.encode(v).map(SqlValue::Text),
    }
}

fn decode(field: &Field, value: SqlValue) -> Result<Value, ValidationError> {
    match (field, value) {
        (Field::Nullable(_), SqlValue::Null) => Ok(Value::Null),
        (Field::Nullable(inner), v) => decode(inner, v),
        (_, SqlValue::Null) => Err(ValidationError::new("unexpected NULL")),
        (Field::List(_), SqlValue::Text(s)) => {
            let wire: serde_json::Value = serde_json::from_str(&s)
                .map_err(|e| ValidationError::new(format!("invalid JSON list: {}", e)))?;
            field.deserialize(&wire)
        }
        (Field::Boolean, SqlValue::Integer(i)) => match i {
            0 => Ok(Value::Bool(false)),
            1 => Ok(Value::Bool(true)),
            other => Err(ValidationError::new(format!("{} is not a boolean", other))),
        },
        (Field::Boolean, SqlValue::Bool(b)) => Ok(Value::Bool(b)),
        (Field::Float(_), SqlValue::Integer(i)) => field.validate(Value::Float(i as f64)),
        (Field::Float(_), SqlValue::Real(r)) => field.validate(Value::Float(r)),
        (Field::Decimal { .. }, SqlValue::Integer(i)) => field.from_scaled(i),
        (Field::Decimal { .. }, SqlValue::Real(r)) => field.validate(Value::Float(r)),
        (Field::Binary, SqlValue::Blob(b)) => field.validate(Value::Bytes(b)),
        (_, SqlValue::Integer(i)) => field.validate(Value::Int(i)),
        (_, SqlValue::Text(s)) => field.decode(&s),
        (field, other) => Err(ValidationError::new(format!(
            "cannot read {:?} as {}",
            other,
            field.kind()
        ))),
    }
}
