//! Record schemas
//!
//! A [`Schema`] is an ordered list of named fields plus the set of fields that
//! may be absent. Derivations (`pick`, `omit`, `partial`) are pure: they build
//! a new schema and leave the receiver unchanged.

use crate::error::{PathSegment, ValidationError};
use crate::field::{escape, unescape, Field};
use crate::value::{Record, Value};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeSet;

/// Ordered field-name to [`Field`] mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<(String, Field)>,
    optional: BTreeSet<String>,
}

impl Schema {
    /// Empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: append a required field, replacing any field of the same name
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((name, field)),
        }
        self
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// True if the schema has a field with this name
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Field names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// `(name, field)` pairs in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// True if the field may be absent from a record
    pub fn is_optional(&self, name: &str) -> bool {
        self.optional.contains(name)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the schema has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    // =========================================================================
    // Derivations
    // =========================================================================

    /// Keep only the named fields, in schema order
    pub fn pick<S: AsRef<str>>(&self, names: &[S]) -> Schema {
        let keep: BTreeSet<&str> = names.iter().map(AsRef::as_ref).collect();
        self.filtered(|name| keep.contains(name))
    }

    /// Drop the named fields
    pub fn omit<S: AsRef<str>>(&self, names: &[S]) -> Schema {
        let drop: BTreeSet<&str> = names.iter().map(AsRef::as_ref).collect();
        self.filtered(|name| !drop.contains(name))
    }

    /// Make the named fields optional
    pub fn partial<S: AsRef<str>>(&self, names: &[S]) -> Schema {
        let mut out = self.clone();
        for name in names {
            if self.contains(name.as_ref()) {
                out.optional.insert(name.as_ref().to_string());
            }
        }
        out
    }

    /// Make every field optional
    pub fn partial_all(&self) -> Schema {
        let mut out = self.clone();
        out.optional = self.fields.iter().map(|(n, _)| n.clone()).collect();
        out
    }

    /// Make the named fields required
    pub fn required<S: AsRef<str>>(&self, names: &[S]) -> Schema {
        let mut out = self.clone();
        for name in names {
            out.optional.remove(name.as_ref());
        }
        out
    }

    fn filtered<F: Fn(&str) -> bool>(&self, keep: F) -> Schema {
        let fields: Vec<(String, Field)> = self
            .fields
            .iter()
            .filter(|(n, _)| keep(n.as_str()))
            .cloned()
            .collect();
        let optional = self
            .optional
            .iter()
            .filter(|n| keep(n.as_str()))
            .cloned()
            .collect();
        Schema { fields, optional }
    }

    // =========================================================================
    // Record-level codec
    // =========================================================================

    /// Validate every field, collecting failures under their field name
    ///
    /// Unknown fields and missing required fields are failures too.
    pub fn validate(&self, record: Record) -> Result<Record, ValidationError> {
        let mut errors = Vec::new();
        for name in record.names() {
            if !self.contains(name) {
                errors.push((
                    PathSegment::Key(name.to_string()),
                    ValidationError::new("unknown field"),
                ));
            }
        }

        let mut input = record;
        let mut out = Record::new();
        for (name, field) in &self.fields {
            match input.remove(name) {
                Some(value) => match field.validate(value) {
                    Ok(v) => {
                        out.insert(name.clone(), v);
                    }
                    Err(e) => errors.push((PathSegment::Key(name.clone()), e)),
                },
                None if self.optional.contains(name) => {}
                None => errors.push((
                    PathSegment::Key(name.clone()),
                    ValidationError::new("is required"),
                )),
            }
        }

        if errors.is_empty() {
            Ok(out)
        } else {
            Err(ValidationError::composite("record is invalid", errors))
        }
    }

    /// Convert a validated record to a JSON object
    pub fn serialize(&self, record: &Record) -> Result<JsonValue, ValidationError> {
        let mut map = Map::new();
        self.each_present(record, |name, field, value| {
            map.insert(name.to_string(), field.serialize(value)?);
            Ok(())
        })?;
        Ok(JsonValue::Object(map))
    }

    /// Convert a JSON object into a validated record
    pub fn deserialize(&self, wire: &JsonValue) -> Result<Record, ValidationError> {
        let JsonValue::Object(map) = wire else {
            return Err(ValidationError::new("expected an object"));
        };
        let mut errors = Vec::new();
        let mut out = Record::new();
        for (name, value) in map {
            match self.get(name) {
                Some(field) => match field.deserialize(value) {
                    Ok(v) => {
                        out.insert(name.clone(), v);
                    }
                    Err(e) => errors.push((PathSegment::Key(name.clone()), e)),
                },
                None => errors.push((
                    PathSegment::Key(name.clone()),
                    ValidationError::new("unknown field"),
                )),
            }
        }
        if !errors.is_empty() {
            return Err(ValidationError::composite("record is invalid", errors));
        }
        self.validate(out)
    }

    /// Encode a record as a URL query string (`a=1&b=x`) in schema order
    pub fn encode(&self, record: &Record) -> Result<String, ValidationError> {
        let mut parts = Vec::with_capacity(record.len());
        self.each_present(record, |name, field, value| {
            parts.push(format!("{}={}", escape(name), escape(&field.encode(value)?)));
            Ok(())
        })?;
        Ok(parts.join("&"))
    }

    /// Reverse [`Schema::encode`]
    pub fn decode(&self, encoded: &str) -> Result<Record, ValidationError> {
        let mut errors = Vec::new();
        let mut out = Record::new();
        for part in encoded.split('&').filter(|p| !p.is_empty()) {
            let (raw_name, raw_value) = part.split_once('=').unwrap_or((part, ""));
            let name = unescape(raw_name)?;
            let Some(field) = self.get(&name) else {
                errors.push((PathSegment::Key(name), ValidationError::new("unknown field")));
                continue;
            };
            match unescape(raw_value).and_then(|v| field.decode(&v)) {
                Ok(v) => {
                    out.insert(name, v);
                }
                Err(e) => errors.push((PathSegment::Key(name), e)),
            }
        }
        if !errors.is_empty() {
            return Err(ValidationError::composite("record is invalid", errors));
        }
        self.validate(out)
    }

    /// Sortable encoding of each present field, in schema order
    pub fn encode_sortable(&self, record: &Record) -> Result<Vec<(String, String)>, ValidationError> {
        let mut out = Vec::with_capacity(record.len());
        self.each_present(record, |name, field, value| {
            out.push((name.to_string(), field.encode_sortable(value)?));
            Ok(())
        })?;
        Ok(out)
    }

    /// Visit present fields in schema order, collecting failures per key
    fn each_present<F>(&self, record: &Record, mut visit: F) -> Result<(), ValidationError>
    where
        F: FnMut(&str, &Field, &Value) -> Result<(), ValidationError>,
    {
        let mut errors = Vec::new();
        for (name, field) in &self.fields {
            if let Some(value) = record.get(name) {
                if let Err(e) = visit(name, field, value) {
                    errors.push((PathSegment::Key(name.clone()), e));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::composite("record is invalid", errors))
        }
    }
}
