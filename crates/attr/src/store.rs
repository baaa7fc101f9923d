//! Attribute-store implementation of [`VersionedStore`]
//!
//! The service only offers single-item conditional writes, so optimistic
//! concurrency is explicit: `update`, `replace` and `amend` read the item,
//! check the caller's identity against it, then put the merged attributes
//! on the condition that the stored version is still the one just read. A
//! lost race surfaces as `NotFound`, the same as a stale version.
//!
//! `create` puts on the condition that the first key attribute is absent.
//! `destroy` deletes on the stored version, after matching any identity
//! fields beyond the key against the current item.

use crate::client::{AttributeClient, Expected};
use crate::error::AttrError;
use crate::item::{encode_value, from_attributes, item_name, to_attributes};
use crate::scan::AttrScan;
use crate::select::{Condition, Select};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use vstore_core::{
    paginate, Amended, Direction, Error, Filter, Page, PreparedQuery, Query, Record, RecordScan,
    Resource, Result, StoreConfig, Value, VersionedStore,
};

/// Versioned store over one attribute-store domain named after the resource
pub struct AttrStore<C> {
    resource: Resource,
    client: Arc<C>,
    config: StoreConfig,
}

impl<C: AttributeClient + 'static> AttrStore<C> {
    /// Store with the default configuration
    pub fn new(resource: Resource, client: Arc<C>) -> Self {
        Self {
            resource,
            client,
            config: StoreConfig::default(),
        }
    }

    /// Store with an explicit configuration
    pub fn with_config(resource: Resource, client: Arc<C>, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            resource,
            client,
            config,
        })
    }

    /// The underlying client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Create the backing domain if it does not exist
    pub async fn ensure_domain(&self) -> Result<()> {
        self.client.create_domain(self.domain()).await?;
        Ok(())
    }

    fn domain(&self) -> &str {
        self.resource.name()
    }

    async fn load(&self, item: &str) -> Result<Option<Record>> {
        let attrs = self
            .client
            .get_attributes(self.domain(), item, self.config.consistent_read)
            .await?;
        match attrs {
            Some(attrs) => Ok(Some(from_attributes(&self.resource, item, &attrs)?)),
            None => Ok(None),
        }
    }

    /// Stored form of `value` for field `name`
    fn encode(&self, name: &str, value: &Value) -> Result<String> {
        let field = self
            .resource
            .schema()
            .get(name)
            .ok_or_else(|| Error::Config(format!("unknown field '{}'", name)))?;
        encode_value(field, value).map_err(|source| {
            AttrError::Encode {
                attribute: name.to_string(),
                source,
            }
            .into()
        })
    }

    /// Condition that holds while the stored version equals `record`'s
    fn version_guard(&self, record: &Record) -> Result<Expected> {
        let version_by = self.resource.version_by();
        match self.resource.version_of(record) {
            Some(version) => Ok(Expected::equals(version_by, self.encode(version_by, version)?)),
            None => Ok(Expected::absent(version_by)),
        }
    }

    /// Conditional put that fails if the first key attribute already exists
    async fn insert(&self, record: &Record) -> Result<Record> {
        let item = item_name(&self.resource, record)?;
        let attrs = to_attributes(&self.resource, record)?;
        let guard = self
            .resource
            .identify_by()
            .first()
            .map(|name| Expected::absent(name.clone()));
        match self
            .client
            .put_attributes(self.domain(), &item, &attrs, guard.as_ref())
            .await
        {
            Ok(()) => {
                debug!(target: "vstore::attr", domain = self.domain(), item = %item, "Created item");
                Ok(record.clone())
            }
            Err(e) if e.is_condition_failure() => {
                Err(self.resource.already_exists(&self.resource.key_of(record)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read, check `identity`, then put `changes` guarded on the version read
    ///
    /// With `keep_current` the changes are merged over the stored record;
    /// otherwise only the stored key survives.
    async fn swap(&self, identity: &Record, changes: &Record, keep_current: bool) -> Result<Record> {
        let item = item_name(&self.resource, identity)?;
        let current = match self.load(&item).await? {
            Some(current) if current.matches(identity) => current,
            _ => return Err(self.resource.not_found(identity)),
        };

        let version = self.resource.next_version(self.resource.version_of(&current))?;
        let mut next = if keep_current {
            current.clone()
        } else {
            self.resource.key_of(&current)
        };
        next.merge(changes.clone());
        next.insert(self.resource.version_by(), version);

        let guard = self.version_guard(&current)?;
        let attrs = to_attributes(&self.resource, &next)?;
        match self
            .client
            .put_attributes(self.domain(), &item, &attrs, Some(&guard))
            .await
        {
            Ok(()) => Ok(next),
            Err(e) if e.is_condition_failure() => {
                warn!(
                    target: "vstore::attr",
                    domain = self.domain(),
                    item = %item,
                    "Conditional put lost to a concurrent write"
                );
                Err(self.resource.not_found(identity))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn select(&self, prepared: &PreparedQuery, limit: usize) -> Result<Select> {
        let ordering = prepared.ordering.as_str();
        let mut select = Select::from(self.domain()).filter(Condition::IsNotNull(ordering.to_string()));
        if self
            .resource
            .schema()
            .get(ordering)
            .is_some_and(|field| field.is_nullable())
        {
            select = select.filter(Condition::NotEq(ordering.to_string(), String::new()));
        }
        for (name, filter) in &prepared.filters {
            select = select.filter(match filter {
                Filter::Eq(value) => Condition::Eq(name.clone(), self.encode(name, value)?),
                Filter::In(values) => Condition::In(
                    name.clone(),
                    values
                        .iter()
                        .map(|v| self.encode(name, v))
                        .collect::<Result<Vec<_>>>()?,
                ),
            });
        }
        if let Some(since) = &prepared.since {
            let bound = self.encode(ordering, since)?;
            select = select.filter(match prepared.direction {
                Direction::Asc => Condition::Greater(ordering.to_string(), bound),
                Direction::Desc => Condition::Less(ordering.to_string(), bound),
            });
        }
        Ok(select.order_by(ordering, prepared.direction).limit(limit))
    }
}

#[async_trait]
impl<C: AttributeClient + 'static> VersionedStore for AttrStore<C> {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    async fn retrieve(&self, identity: &Record) -> Result<Record> {
        let identity = self.resource.prepare_identity(identity)?;
        let item = item_name(&self.resource, &identity)?;
        match self.load(&item).await? {
            Some(record) if record.matches(&identity) => Ok(record),
            _ => Err(self.resource.not_found(&identity)),
        }
    }

    async fn create(&self, record: Record) -> Result<Record> {
        let record = self.resource.prepare_creation(record)?;
        self.insert(&record).await
    }

    async fn replace(&self, identity: &Record, record: Record) -> Result<Record> {
        let identity = self.resource.prepare_identity(identity)?;
        let replacement = self.resource.prepare_replacement(&identity, record)?;
        self.swap(&identity, &replacement, false).await
    }

    async fn update(&self, identity: &Record, changes: Record) -> Result<Record> {
        let identity = self.resource.prepare_identity(identity)?;
        let changes = self.resource.prepare_changes(changes)?;
        self.swap(&identity, &changes, true).await
    }

    async fn amend(&self, identity: &Record, changes: Record) -> Result<Amended> {
        let identity = self.resource.prepare_identity(identity)?;
        let changes = self.resource.prepare_changes(changes)?;
        let stored = self.swap(&identity, &changes, true).await?;
        let version = self
            .resource
            .version_of(&stored)
            .cloned()
            .unwrap_or(Value::Null);
        Ok(Amended { changes, version })
    }

    async fn upsert(&self, creation: Record, changes: Record) -> Result<Record> {
        let record = self.resource.prepare_creation(creation)?;
        let changes = self.resource.prepare_changes(changes)?;
        let key = self.resource.key_of(&record);
        let attempts = self.config.cas_attempts;

        for attempt in 1..=attempts {
            match self.insert(&record).await {
                Ok(created) => return Ok(created),
                Err(e) if e.is_conflict() => {}
                Err(e) => return Err(e),
            }
            match self.swap(&key, &changes, true).await {
                Ok(updated) => return Ok(updated),
                Err(e) if e.is_not_found() => {
                    warn!(
                        target: "vstore::attr",
                        domain = self.domain(),
                        identity = %self.resource.describe(&key),
                        attempt,
                        attempts,
                        "Upsert raced a concurrent write, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(self.resource.precondition_failed(
            &key,
            format!("gave up after {} conflicting attempts", attempts),
        ))
    }

    async fn write(&self, record: Record) -> Result<Record> {
        let mut record = self.resource.prepare_creation(record)?;
        let item = item_name(&self.resource, &record)?;
        if let Some(current) = self.load(&item).await? {
            let version = self.resource.next_version(self.resource.version_of(&current))?;
            record.insert(self.resource.version_by(), version);
        }
        let attrs = to_attributes(&self.resource, &record)?;
        self.client
            .put_attributes(self.domain(), &item, &attrs, None)
            .await?;
        debug!(target: "vstore::attr", domain = self.domain(), item = %item, "Wrote item");
        Ok(record)
    }

    async fn destroy(&self, identity: &Record) -> Result<()> {
        let identity = self.resource.prepare_identity(identity)?;
        let item = item_name(&self.resource, &identity)?;
        let key = self.resource.key_of(&identity);

        let guard = if identity.len() > key.len() {
            match self.load(&item).await? {
                Some(current) if current.matches(&identity) => self.version_guard(&current)?,
                _ => return Err(self.resource.not_found(&identity)),
            }
        } else {
            let (name, value) = key
                .iter()
                .next()
                .ok_or_else(|| Error::Config("resource has no key fields".to_string()))?;
            Expected::equals(name.clone(), self.encode(name, value)?)
        };

        match self
            .client
            .delete_attributes(self.domain(), &item, Some(&guard))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_condition_failure() => Err(self.resource.not_found(&identity)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, query: &Query) -> Result<Page> {
        let prepared = self.resource.prepare_query(query)?;
        let page_size = self.config.page_size;
        if prepared.matches_nothing() {
            return paginate(&self.resource, query, Vec::new(), page_size);
        }
        let expression = self.select(&prepared, page_size)?.build();

        let mut results = Vec::with_capacity(page_size);
        let mut token: Option<String> = None;
        loop {
            let output = self
                .client
                .select(&expression, token.as_deref(), self.config.consistent_read)
                .await?;
            debug!(
                target: "vstore::attr",
                expression = %expression,
                items = output.items.len(),
                more = output.next_token.is_some(),
                "Selected items"
            );
            for (item, attrs) in &output.items {
                results.push(from_attributes(&self.resource, item, attrs)?);
            }
            match output.next_token {
                Some(next) if results.len() < page_size => token = Some(next),
                _ => break,
            }
        }
        paginate(&self.resource, query, results, page_size)
    }

    async fn scan(&self, query: Option<&Query>) -> Result<Box<dyn RecordScan>> {
        let chunk = self.config.scan_chunk_size;
        let expression = match query {
            Some(query) => {
                let prepared = self.resource.prepare_query(query)?;
                if prepared.matches_nothing() {
                    None
                } else {
                    Some(self.select(&prepared, chunk)?.build())
                }
            }
            None => Some(Select::from(self.domain()).limit(chunk).build()),
        };
        Ok(Box::new(AttrScan::new(
            Arc::clone(&self.client),
            self.resource.clone(),
            expression,
            self.config.consistent_read,
        )))
    }
}
