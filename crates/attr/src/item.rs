//! Mapping between records and attribute-store items
//!
//! Item names come from the key: a single key field uses its URL-safe
//! encoding, a composite key the URL query string of its fields. Attribute
//! values use the offset sortable encoding so the service's lexicographic
//! comparisons follow value order. Null is stored as the empty string.

use crate::client::Attributes;
use crate::error::AttrError;
use vstore_core::{Error, Field, Record, Resource, Result, ValidationError, Value};

/// Item name for the key fields of `identity`
pub fn item_name(resource: &Resource, identity: &Record) -> Result<String> {
    let key = resource.identify_by();
    if let [name] = key {
        let field = key_field(resource, name)?;
        let value = identity
            .get(name)
            .ok_or_else(|| ValidationError::new(format!("missing key field '{}'", name)))?;
        return Ok(field.encode(value)?);
    }
    Ok(resource.schema().pick(key).encode(&resource.key_of(identity))?)
}

fn key_field<'a>(resource: &'a Resource, name: &str) -> Result<&'a Field> {
    resource
        .schema()
        .get(name)
        .ok_or_else(|| Error::Config(format!("unknown key field '{}'", name)))
}

/// Stored form of a single value
pub fn encode_value(field: &Field, value: &Value) -> std::result::Result<String, ValidationError> {
    match value {
        Value::Null => Ok(String::new()),
        v => field.encode_sortable_offset(v),
    }
}

/// Attributes for a full record
pub fn to_attributes(resource: &Resource, record: &Record) -> std::result::Result<Attributes, AttrError> {
    let mut attrs = Attributes::new();
    for (name, field) in resource.schema().fields() {
        let Some(value) = record.get(name) else {
            continue;
        };
        let encoded = encode_value(field, value).map_err(|source| AttrError::Encode {
            attribute: name.to_string(),
            source,
        })?;
        attrs.insert(name.to_string(), encoded);
    }
    Ok(attrs)
}

/// Record from stored attributes; unknown attributes are ignored
pub fn from_attributes(
    resource: &Resource,
    item: &str,
    attrs: &Attributes,
) -> std::result::Result<Record, AttrError> {
    let mut record = Record::new();
    for (name, field) in resource.schema().fields() {
        let Some(raw) = attrs.get(name) else {
            continue;
        };
        let value = field.decode_sortable(raw).map_err(|source| AttrError::Decode {
            item: item.to_string(),
            attribute: name.to_string(),
            source,
        })?;
        record.insert(name, value);
    }
    Ok(record)
}
