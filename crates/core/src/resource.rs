//! Resources: a named schema with identity and version configuration
//!
//! ## Derived Schemas
//!
//! - **identity**: `identify_by` fields (required) plus the version field (optional)
//! - **update**: every field except `identify_by`, all optional
//! - **creation**: the full schema with the version field optional
//!
//! The `prepare_*` helpers run validation before any backend call is issued,
//! so a rejected request never partially applies.

use crate::error::{Error, PathSegment, Result, ValidationError};
use crate::field::Field;
use crate::query::{Filter, PreparedQuery, Query};
use crate::schema::Schema;
use crate::value::{Record, Value};
use crate::version;

/// Schema plus identity (`identify_by`) and optimistic-concurrency (`version_by`) fields
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    name: String,
    schema: Schema,
    identify_by: Vec<String>,
    version_by: String,
    identity: Schema,
    update: Schema,
    creation: Schema,
}

impl Resource {
    /// Create a resource
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a named field is missing from the schema,
    /// the key is empty, the version field is part of the key, or the version
    /// field's kind cannot be generated by the store.
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        schema: Schema,
        identify_by: &[S],
        version_by: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let version_by = version_by.into();
        let identify_by: Vec<String> = identify_by.iter().map(|s| s.as_ref().to_string()).collect();

        if name.is_empty() {
            return Err(Error::Config("resource name must not be empty".to_string()));
        }
        if identify_by.is_empty() {
            return Err(Error::Config(format!(
                "resource '{}' needs at least one identity field",
                name
            )));
        }
        for field in identify_by.iter().chain(std::iter::once(&version_by)) {
            if !schema.contains(field) {
                return Err(Error::Config(format!(
                    "resource '{}' has no field '{}'",
                    name, field
                )));
            }
        }
        if identify_by.contains(&version_by) {
            return Err(Error::Config(format!(
                "version field '{}' of '{}' cannot be part of the identity",
                version_by, name
            )));
        }
        if let Some(field) = schema.get(&version_by) {
            if !version::can_generate(field) {
                return Err(Error::Config(format!(
                    "version field '{}' of '{}' has unsupported kind {}",
                    version_by,
                    name,
                    field.kind()
                )));
            }
        }

        let mut identity_names = identify_by.clone();
        identity_names.push(version_by.clone());
        let identity = schema
            .pick(&identity_names)
            .required(&identify_by)
            .partial(&[&version_by]);
        let update = schema.omit(&identify_by).partial_all();
        let creation = schema.partial(&[&version_by]);

        Ok(Self {
            name,
            schema,
            identify_by,
            version_by,
            identity,
            update,
            creation,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Resource name (table or domain)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full record schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Primary-key field names
    pub fn identify_by(&self) -> &[String] {
        &self.identify_by
    }

    /// Version field name
    pub fn version_by(&self) -> &str {
        &self.version_by
    }

    /// Identity schema: key required, version optional
    pub fn identity_schema(&self) -> &Schema {
        &self.identity
    }

    /// Update schema: every non-key field, all optional
    pub fn update_schema(&self) -> &Schema {
        &self.update
    }

    /// Creation schema: full schema with the version optional
    pub fn creation_schema(&self) -> &Schema {
        &self.creation
    }

    /// Field codec of the version field
    pub fn version_field(&self) -> Option<&Field> {
        self.schema.get(&self.version_by)
    }

    /// The key fields of `record`
    pub fn key_of(&self, record: &Record) -> Record {
        record.pick(&self.identify_by)
    }

    /// The version value of `record`, if present
    pub fn version_of<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        record.get(&self.version_by)
    }

    /// Identity (key plus version) of a full record
    pub fn identity_of(&self, record: &Record) -> Record {
        let mut identity = self.key_of(record);
        if let Some(v) = self.version_of(record) {
            identity.insert(self.version_by.clone(), v.clone());
        }
        identity
    }

    /// Human-readable identity for error messages
    pub fn describe(&self, identity: &Record) -> String {
        self.identity
            .encode(identity)
            .unwrap_or_else(|_| format!("{:?}", identity))
    }

    // =========================================================================
    // Preparation
    // =========================================================================

    /// Validate an identity
    pub fn prepare_identity(&self, identity: &Record) -> Result<Record> {
        Ok(self.identity.validate(identity.clone())?)
    }

    /// Validate a full record and give it a fresh version
    pub fn prepare_creation(&self, record: Record) -> Result<Record> {
        let mut record = self.creation.validate(record)?;
        let version = self.next_version(None)?;
        record.insert(self.version_by.clone(), version);
        Ok(record)
    }

    /// Validate partial changes; any caller-supplied version is dropped
    pub fn prepare_changes(&self, changes: Record) -> Result<Record> {
        let mut changes = self.update.validate(changes)?;
        changes.remove(&self.version_by);
        Ok(changes)
    }

    /// Validate a replacement record for `identity`
    ///
    /// Every non-key field is required. Key fields may be repeated but must
    /// equal the identity's; the version is dropped.
    pub fn prepare_replacement(&self, identity: &Record, record: Record) -> Result<Record> {
        let key = self.key_of(identity);
        let mut errors = Vec::new();
        for name in &self.identify_by {
            if let (Some(given), Some(expected)) = (record.get(name), key.get(name)) {
                if given != expected {
                    errors.push((
                        PathSegment::Key(name.clone()),
                        ValidationError::new("identity fields cannot be replaced"),
                    ));
                }
            }
        }
        if !errors.is_empty() {
            return Err(ValidationError::composite("record is invalid", errors).into());
        }
        let mut full = record;
        full.merge(key);
        let mut full = self.creation.validate(full)?;
        full.remove(&self.version_by);
        for name in &self.identify_by {
            full.remove(name);
        }
        Ok(full)
    }

    /// Validate filters and decode the cursor of a list query
    pub fn prepare_query(&self, query: &Query) -> Result<PreparedQuery> {
        let mut errors = Vec::new();
        let mut filters = Vec::with_capacity(query.filters.len());

        for (name, filter) in &query.filters {
            let Some(field) = self.schema.get(name) else {
                errors.push((PathSegment::Key(name.clone()), ValidationError::new("unknown field")));
                continue;
            };
            let checked = match filter {
                Filter::Eq(v) => check_filter_value(field, v).map(Filter::Eq),
                Filter::In(values) => values
                    .iter()
                    .map(|v| check_filter_value(field, v))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map(Filter::In),
            };
            match checked {
                Ok(f) => filters.push((name.clone(), f)),
                Err(e) => errors.push((PathSegment::Key(name.clone()), e)),
            }
        }

        let since = match self.schema.get(&query.ordering) {
            None => {
                errors.push((
                    PathSegment::Key(query.ordering.clone()),
                    ValidationError::new("unknown ordering field"),
                ));
                None
            }
            Some(field) => match &query.since {
                None => None,
                Some(cursor) => match field.decode_sortable(cursor) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        errors.push((PathSegment::Key("since".to_string()), e));
                        None
                    }
                },
            },
        };

        if !errors.is_empty() {
            return Err(ValidationError::composite("query is invalid", errors).into());
        }
        Ok(PreparedQuery {
            filters,
            ordering: query.ordering.clone(),
            direction: query.direction,
            since,
        })
    }

    /// Next store-assigned version value
    pub fn next_version(&self, previous: Option<&Value>) -> Result<Value> {
        self.version_field()
            .and_then(|field| version::next_version(field, previous))
            .ok_or_else(|| {
                Error::Config(format!(
                    "cannot generate versions for '{}.{}'",
                    self.name, self.version_by
                ))
            })
    }

    // =========================================================================
    // Errors
    // =========================================================================

    /// `NotFound` for this identity
    pub fn not_found(&self, identity: &Record) -> Error {
        Error::NotFound {
            resource: self.name.clone(),
            identity: self.describe(identity),
        }
    }

    /// `AlreadyExists` for this identity
    pub fn already_exists(&self, identity: &Record) -> Error {
        Error::AlreadyExists {
            resource: self.name.clone(),
            identity: self.describe(identity),
        }
    }

    /// `PreconditionFailed` for this identity
    pub fn precondition_failed(&self, identity: &Record, reason: impl Into<String>) -> Error {
        Error::PreconditionFailed {
            resource: self.name.clone(),
            identity: self.describe(identity),
            reason: reason.into(),
        }
    }
}

/// Null is always a valid filter value; it selects null fields
fn check_filter_value(field: &Field, value: &Value) -> std::result::Result<Value, ValidationError> {
    match value {
        Value::Null => Ok(Value::Null),
        v => field.validate(v.clone()),
    }
}
