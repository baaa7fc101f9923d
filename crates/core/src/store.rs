//! The versioned store contract
//!
//! Every backend implements [`VersionedStore`]. The contract is the same
//! across backends; what differs is how each one detects conflicts.
//!
//! ## Operations
//!
//! | Operation | Success | Failure |
//! |-----------|---------|---------|
//! | `retrieve` | matching record | `NotFound` |
//! | `create` | stored record | `AlreadyExists` / `PreconditionFailed` |
//! | `replace` / `update` | stored record | `NotFound` |
//! | `amend` | applied changes plus new version | `NotFound` |
//! | `upsert` / `write` | stored record | backend errors only |
//! | `destroy` | `()` | `NotFound` |
//! | `clear` | `()` | backend errors only |
//! | `list` | one [`Page`] | validation / backend |
//! | `scan` | [`RecordScan`] of chunks | validation / backend |
//! | `batch_retrieve` | `Vec<Option<Record>>` aligned with input | backend errors only |
//!
//! `amend` is weaker than `update`: it returns the changes that were applied
//! and the version the store assigned, not the merged record.
//!
//! No operation retries a lost conditional write. [`cas_update`] is the
//! opt-in loop for callers that want compare-and-swap retries.

use crate::error::Result;
use crate::query::{Page, Query};
use crate::resource::Resource;
use crate::value::{Record, Value};
use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

/// Result of [`VersionedStore::amend`]
#[derive(Debug, Clone, PartialEq)]
pub struct Amended {
    /// Validated changes that were written
    pub changes: Record,
    /// Version value assigned by the store
    pub version: Value,
}

/// A lazily consumed sequence of record chunks
///
/// A scan may hold a backend connection or cursor. Callers that stop before
/// `next_chunk` returns `None` must call [`RecordScan::close`].
#[async_trait]
pub trait RecordScan: Send {
    /// Next chunk, or `None` when the scan is exhausted
    async fn next_chunk(&mut self) -> Result<Option<Vec<Record>>>;

    /// Release the underlying backend resources
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Collect every remaining chunk of a scan, closing it afterwards
pub async fn drain(mut scan: Box<dyn RecordScan>) -> Result<Vec<Record>> {
    let mut out = Vec::new();
    loop {
        match scan.next_chunk().await {
            Ok(Some(chunk)) => out.extend(chunk),
            Ok(None) => break,
            Err(e) => {
                // Report the read failure, not a secondary close failure
                let _ = scan.close().await;
                return Err(e);
            }
        }
    }
    scan.close().await?;
    Ok(out)
}

/// Optimistic-concurrency CRUD over one resource
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// The resource this store serves
    fn resource(&self) -> &Resource;

    /// Fetch the record matching every supplied identity field
    async fn retrieve(&self, identity: &Record) -> Result<Record>;

    /// Insert a new record; fails if the identity already exists
    async fn create(&self, record: Record) -> Result<Record>;

    /// Overwrite every non-key field of an existing record
    async fn replace(&self, identity: &Record, record: Record) -> Result<Record>;

    /// Apply partial changes to an existing record, returning the merged record
    async fn update(&self, identity: &Record, changes: Record) -> Result<Record>;

    /// Apply partial changes, returning only what was applied
    async fn amend(&self, identity: &Record, changes: Record) -> Result<Amended>;

    /// Insert `creation`, or apply `changes` if the identity already exists
    async fn upsert(&self, creation: Record, changes: Record) -> Result<Record>;

    /// Unconditionally store the full record
    async fn write(&self, record: Record) -> Result<Record>;

    /// Delete an existing record
    async fn destroy(&self, identity: &Record) -> Result<()>;

    /// Delete a record if it exists
    async fn clear(&self, identity: &Record) -> Result<()> {
        match self.destroy(identity).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    /// One page of an ordered, filtered query
    async fn list(&self, query: &Query) -> Result<Page>;

    /// Chunked scan; unordered when `query` is `None`
    async fn scan(&self, query: Option<&Query>) -> Result<Box<dyn RecordScan>>;

    /// Retrieve many identities concurrently
    ///
    /// The output is aligned with `identities`; missing records are `None`.
    async fn batch_retrieve(&self, identities: &[Record]) -> Result<Vec<Option<Record>>> {
        let results = join_all(identities.iter().map(|id| self.retrieve(id))).await;
        results
            .into_iter()
            .map(|r| match r {
                Ok(record) => Ok(Some(record)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            })
            .collect()
    }
}

/// Read-modify-write with bounded retries on lost conditional writes
///
/// Each attempt retrieves the current record, asks `mutator` for changes
/// and updates guarded by the version just read. A lost race shows up as
/// `NotFound` or a conflict from the guarded update and triggers another
/// attempt. A record that is genuinely absent fails on the retrieve.
///
/// # Errors
///
/// Returns `PreconditionFailed` once `attempts` guarded updates have lost.
pub async fn cas_update<S, F>(
    store: &S,
    identity: &Record,
    attempts: usize,
    mut mutator: F,
) -> Result<Record>
where
    S: VersionedStore + ?Sized,
    F: FnMut(&Record) -> Result<Record>,
{
    let resource = store.resource();
    let key = resource.key_of(identity);

    for attempt in 1..=attempts {
        let current = store.retrieve(&key).await?;
        let changes = mutator(&current)?;
        let guard = resource.identity_of(&current);
        match store.update(&guard, changes).await {
            Ok(updated) => return Ok(updated),
            Err(e) if e.is_not_found() || e.is_conflict() => {
                warn!(
                    target: "vstore::store",
                    resource = resource.name(),
                    identity = %resource.describe(&key),
                    attempt,
                    attempts,
                    "Conditional update lost a race, retrying"
                );
            }
            Err(e) => return Err(e),
        }
    }

    Err(resource.precondition_failed(
        &key,
        format!("gave up after {} conflicting attempts", attempts),
    ))
}
