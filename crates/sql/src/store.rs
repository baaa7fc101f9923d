//! Relational implementation of [`VersionedStore`]
//!
//! Every operation compiles to exactly one parameterized statement:
//!
//! | Operation | Statement | Zero rows means |
//! |-----------|-----------|-----------------|
//! | `retrieve` | `SELECT ... WHERE <identity> LIMIT 1` | `NotFound` |
//! | `create` | `INSERT ... ON CONFLICT DO NOTHING RETURNING *` | `PreconditionFailed` |
//! | `replace` / `update` / `amend` | `UPDATE ... WHERE <identity> RETURNING *` | `NotFound` |
//! | `upsert` / `write` | `INSERT ... ON CONFLICT (<key>) DO UPDATE ... RETURNING *` | n/a |
//! | `destroy` | `DELETE ... WHERE <identity>` | `NotFound` |
//!
//! A guarded update cannot tell a missing record from a stale version; both
//! surface as `NotFound`.
//!
//! Integer version columns advance with a `CASE` expression so the stored
//! version grows even when two writes land in the same millisecond.

use crate::connection::{SqlConnection, SqlCursor, SqlRow};
use crate::error::SqlError;
use crate::scan::SqlScan;
use crate::statement::{self, Assignment, OnConflict, Predicate, Statement};
use crate::value::{column_type, from_sql, to_sql, SqlValue};
use async_trait::async_trait;
use tracing::{debug, warn};
use vstore_core::{
    paginate, Amended, Direction, Field, Filter, Page, PreparedQuery, Query, Record, RecordScan,
    Resource, Result, StoreConfig, Value, VersionedStore,
};

/// Decode a returned row through the resource's field codecs
///
/// Unknown columns are ignored; `NULL` in a non-nullable column means the
/// field is absent.
pub(crate) fn decode_row(resource: &Resource, mut row: SqlRow) -> std::result::Result<Record, SqlError> {
    let mut record = Record::new();
    for (name, field) in resource.schema().fields() {
        match row.remove(name) {
            Some(SqlValue::Null) if !field.is_nullable() => {}
            Some(value) => {
                record.insert(name, from_sql(name, field, value)?);
            }
            None => {}
        }
    }
    Ok(record)
}

/// Versioned store over a relational table named after the resource
pub struct SqlStore<C> {
    resource: Resource,
    connection: C,
    config: StoreConfig,
}

impl<C: SqlConnection> SqlStore<C> {
    /// Store with the default configuration
    pub fn new(resource: Resource, connection: C) -> Self {
        Self {
            resource,
            connection,
            config: StoreConfig::default(),
        }
    }

    /// Store with an explicit configuration
    pub fn with_config(resource: Resource, connection: C, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            resource,
            connection,
            config,
        })
    }

    /// The underlying connection
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Create the backing table if it does not exist
    pub async fn ensure_table(&self) -> Result<()> {
        let columns: Vec<(String, &str, bool)> = self
            .resource
            .schema()
            .fields()
            .map(|(name, field)| (name.to_string(), column_type(field), field.is_nullable()))
            .collect();
        let ddl = statement::create_table(self.table(), &columns, self.resource.identify_by());
        self.connection.execute(&ddl).await?;
        Ok(())
    }

    fn table(&self) -> &str {
        self.resource.name()
    }

    fn field(&self, name: &str) -> std::result::Result<&Field, SqlError> {
        self.resource
            .schema()
            .get(name)
            .ok_or_else(|| SqlError::Unsupported {
                column: name.to_string(),
                message: "not part of the schema".to_string(),
            })
    }

    fn bind(&self, name: &str, value: &Value) -> std::result::Result<SqlValue, SqlError> {
        if value.is_null() {
            return Ok(SqlValue::Null);
        }
        to_sql(name, self.field(name)?, value)
    }

    /// Columns of a validated record in schema order
    fn columns(&self, record: &Record) -> std::result::Result<Vec<(String, SqlValue)>, SqlError> {
        self.resource
            .schema()
            .fields()
            .filter_map(|(name, _)| record.get(name).map(|v| (name, v)))
            .map(|(name, value)| -> std::result::Result<_, SqlError> {
                Ok((name.to_string(), self.bind(name, value)?))
            })
            .collect()
    }

    /// One equality conjunct per supplied identity field
    fn identity_predicates(&self, identity: &Record) -> std::result::Result<Vec<Predicate>, SqlError> {
        identity
            .iter()
            .map(|(name, value)| -> std::result::Result<_, SqlError> {
                Ok(Predicate::Eq(name.clone(), self.bind(name, value)?))
            })
            .collect()
    }

    fn version_assignment(&self, version: &Value) -> std::result::Result<Assignment, SqlError> {
        let column = self.resource.version_by().to_string();
        let value = self.bind(&column, version)?;
        Ok(match self.resource.version_field().map(Field::inner) {
            Some(Field::Integer(_) | Field::Timestamp) => Assignment::Advance(column, value),
            _ => Assignment::Value(column, value),
        })
    }

    fn change_assignments(&self, changes: &Record) -> std::result::Result<Vec<Assignment>, SqlError> {
        Ok(self
            .columns(changes)?
            .into_iter()
            .map(|(name, value)| Assignment::Value(name, value))
            .collect())
    }

    fn query_statement(
        &self,
        prepared: &PreparedQuery,
        limit: Option<usize>,
    ) -> std::result::Result<Statement, SqlError> {
        let ordering = prepared.ordering.as_str();
        let mut predicates = vec![Predicate::NotNull(ordering.to_string())];
        for (name, filter) in &prepared.filters {
            predicates.push(match filter {
                Filter::Eq(value) => Predicate::Eq(name.clone(), self.bind(name, value)?),
                Filter::In(values) => Predicate::In(
                    name.clone(),
                    values
                        .iter()
                        .map(|v| self.bind(name, v))
                        .collect::<std::result::Result<Vec<_>, _>>()?,
                ),
            });
        }
        if let Some(since) = &prepared.since {
            let bound = self.bind(ordering, since)?;
            predicates.push(match prepared.direction {
                Direction::Asc => Predicate::Greater(ordering.to_string(), bound),
                Direction::Desc => Predicate::Less(ordering.to_string(), bound),
            });
        }
        Ok(statement::select(
            self.table(),
            &predicates,
            Some((ordering, prepared.direction)),
            limit,
        ))
    }

    /// Run a statement expected to return at most one row
    async fn fetch_one(&self, statement: &Statement) -> Result<Option<Record>> {
        let result = self.connection.execute(statement).await?;
        match result.rows.into_iter().next() {
            Some(row) => Ok(Some(decode_row(&self.resource, row)?)),
            None => Ok(None),
        }
    }

    /// Guarded `UPDATE ... RETURNING *` shared by replace, update and amend
    async fn guarded_update(&self, identity: &Record, changes: &Record) -> Result<Record> {
        let version = self.resource.next_version(self.resource.version_of(identity))?;
        let mut set = self.change_assignments(changes)?;
        set.push(self.version_assignment(&version)?);
        let predicates = self.identity_predicates(identity)?;

        let stmt = statement::update(self.table(), &set, &predicates, true);
        match self.fetch_one(&stmt).await? {
            Some(record) => Ok(record),
            None => {
                warn!(
                    target: "vstore::sql",
                    table = self.table(),
                    identity = %self.resource.describe(identity),
                    "Guarded update matched no rows"
                );
                Err(self.resource.not_found(identity))
            }
        }
    }
}

/// Buffer up to `page_size` rows, reading `chunk_size` at a time
async fn read_page(
    cursor: &mut dyn SqlCursor,
    page_size: usize,
    chunk_size: usize,
) -> std::result::Result<Vec<SqlRow>, SqlError> {
    let mut rows = Vec::with_capacity(page_size);
    while rows.len() < page_size {
        let want = chunk_size.min(page_size - rows.len());
        let chunk = cursor.fetch(want).await?;
        let short = chunk.len() < want;
        rows.extend(chunk);
        if short {
            break;
        }
    }
    Ok(rows)
}

#[async_trait]
impl<C: SqlConnection> VersionedStore for SqlStore<C> {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    async fn retrieve(&self, identity: &Record) -> Result<Record> {
        let identity = self.resource.prepare_identity(identity)?;
        let stmt = statement::select(
            self.table(),
            &self.identity_predicates(&identity)?,
            None,
            Some(1),
        );
        self.fetch_one(&stmt)
            .await?
            .ok_or_else(|| self.resource.not_found(&identity))
    }

    async fn create(&self, record: Record) -> Result<Record> {
        let record = self.resource.prepare_creation(record)?;
        let stmt = statement::insert(
            self.table(),
            &self.columns(&record)?,
            &OnConflict::DoNothing,
            true,
        );
        match self.fetch_one(&stmt).await? {
            Some(stored) => {
                debug!(
                    target: "vstore::sql",
                    table = self.table(),
                    identity = %self.resource.describe(&self.resource.key_of(&stored)),
                    "Created record"
                );
                Ok(stored)
            }
            None => {
                let key = self.resource.key_of(&record);
                Err(self
                    .resource
                    .precondition_failed(&key, "identity already exists"))
            }
        }
    }

    async fn replace(&self, identity: &Record, record: Record) -> Result<Record> {
        let identity = self.resource.prepare_identity(identity)?;
        let replacement = self.resource.prepare_replacement(&identity, record)?;
        self.guarded_update(&identity, &replacement).await
    }

    async fn update(&self, identity: &Record, changes: Record) -> Result<Record> {
        let identity = self.resource.prepare_identity(identity)?;
        let changes = self.resource.prepare_changes(changes)?;
        self.guarded_update(&identity, &changes).await
    }

    async fn amend(&self, identity: &Record, changes: Record) -> Result<Amended> {
        let identity = self.resource.prepare_identity(identity)?;
        let changes = self.resource.prepare_changes(changes)?;
        let stored = self.guarded_update(&identity, &changes).await?;
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
        let mut set = self.change_assignments(&changes)?;
        if let Some(version) = self.resource.version_of(&record) {
            set.push(self.version_assignment(version)?);
        }
        let stmt = statement::insert(
            self.table(),
            &self.columns(&record)?,
            &OnConflict::DoUpdate {
                target: self.resource.identify_by().to_vec(),
                set,
            },
            true,
        );
        let key = self.resource.key_of(&record);
        self.fetch_one(&stmt)
            .await?
            .ok_or_else(|| self.resource.not_found(&key))
    }

    async fn write(&self, record: Record) -> Result<Record> {
        let record = self.resource.prepare_creation(record)?;
        let key_fields = self.resource.identify_by();
        let version_by = self.resource.version_by();
        let mut set: Vec<Assignment> = self
            .resource
            .schema()
            .names()
            .filter(|name| {
                record.contains(name)
                    && *name != version_by
                    && !key_fields.iter().any(|k| k == name)
            })
            .map(|name| Assignment::Excluded(name.to_string()))
            .collect();
        if let Some(version) = self.resource.version_of(&record) {
            set.push(self.version_assignment(version)?);
        }
        let stmt = statement::insert(
            self.table(),
            &self.columns(&record)?,
            &OnConflict::DoUpdate {
                target: key_fields.to_vec(),
                set,
            },
            true,
        );
        let key = self.resource.key_of(&record);
        self.fetch_one(&stmt)
            .await?
            .ok_or_else(|| self.resource.not_found(&key))
    }

    async fn destroy(&self, identity: &Record) -> Result<()> {
        let identity = self.resource.prepare_identity(identity)?;
        let stmt = statement::delete(self.table(), &self.identity_predicates(&identity)?, false);
        let result = self.connection.execute(&stmt).await?;
        if result.affected == 0 {
            return Err(self.resource.not_found(&identity));
        }
        Ok(())
    }

    async fn list(&self, query: &Query) -> Result<Page> {
        let prepared = self.resource.prepare_query(query)?;
        let page_size = self.config.page_size;
        let stmt = self.query_statement(&prepared, Some(page_size))?;

        let mut cursor = self.connection.open_cursor(&stmt).await?;
        let buffered = read_page(cursor.as_mut(), page_size, self.config.scan_chunk_size).await;
        let closed = cursor.close().await;
        let rows = buffered?;
        closed?;

        let results = rows
            .into_iter()
            .map(|row| decode_row(&self.resource, row))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(
            target: "vstore::sql",
            table = self.table(),
            ordering = %query.ordering,
            direction = query.direction.as_str(),
            results = results.len(),
            "Listed page"
        );
        paginate(&self.resource, query, results, page_size)
    }

    async fn scan(&self, query: Option<&Query>) -> Result<Box<dyn RecordScan>> {
        let stmt = match query {
            Some(query) => {
                let prepared = self.resource.prepare_query(query)?;
                self.query_statement(&prepared, None)?
            }
            None => statement::select(self.table(), &[], None, None),
        };
        let cursor = self.connection.open_cursor(&stmt).await?;
        Ok(Box::new(SqlScan::new(
            cursor,
            self.resource.clone(),
            self.config.scan_chunk_size,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteConnection;
    use vstore_core::{drain, Error, Schema};

    fn tasks() -> Resource {
        let schema = Schema::new()
            .field("board", Field::id())
            .field("seq", Field::integer())
            .field("title", Field::trimmed())
            .field("points", Field::decimal(1).nullable())
            .field("labels", Field::trimmed().list())
            .field("rev", Field::integer());
        Resource::new("tasks", schema, &["board", "seq"], "rev").unwrap()
    }

    fn task(board: &str, seq: i64, title: &str) -> Record {
        Record::new()
            .with("board", board)
            .with("seq", seq)
            .with("title", title)
            .with("points", Value::Null)
            .with("labels", Vec::<Value>::new())
    }

    fn key(board: &str, seq: i64) -> Record {
        Record::new().with("board", board).with("seq", seq)
    }

    async fn store() -> SqlStore<SqliteConnection> {
        let store = SqlStore::new(tasks(), SqliteConnection::open_in_memory().unwrap());
        store.ensure_table().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_retrieve_and_duplicate() {
        let store = store().await;
        let created = store.create(task("b1", 1, " first ")).await.unwrap();
        assert_eq!(created.get("title"), Some(&Value::from("first")));
        assert!(matches!(created.get("rev"), Some(Value::Int(_))));

        let fetched = store.retrieve(&key("b1", 1)).await.unwrap();
        assert_eq!(fetched, created);

        let err = store.create(task("b1", 1, "again")).await.unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn test_update_advances_version() {
        let store = store().await;
        let created = store.create(task("b1", 1, "t")).await.unwrap();
        let rev = created.get("rev").cloned().unwrap();

        let mut guard = key("b1", 1);
        guard.insert("rev", rev.clone());
        let updated = store
            .update(&guard, Record::new().with("points", "2.5"))
            .await
            .unwrap();
        assert_eq!(updated.get("points"), Some(&Value::from("2.5")));
        assert_eq!(updated.get("title"), Some(&Value::from("t")));
        assert!(updated.get("rev").unwrap().as_i64() > rev.as_i64());

        // The old version no longer matches
        let err = store
            .update(&guard, Record::new().with("title", "x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_amend_returns_changes() {
        let store = store().await;
        store.create(task("b1", 1, "t")).await.unwrap();
        let amended = store
            .amend(&key("b1", 1), Record::new().with("labels", vec![Value::from("x")]))
            .await
            .unwrap();
        assert_eq!(
            amended.changes,
            Record::new().with("labels", vec![Value::from("x")])
        );
        let stored = store.retrieve(&key("b1", 1)).await.unwrap();
        assert_eq!(stored.get("rev"), Some(&amended.version));
    }

    #[tokio::test]
    async fn test_replace_requires_full_record() {
        let store = store().await;
        store.create(task("b1", 1, "t")).await.unwrap();
        let replaced = store
            .replace(
                &key("b1", 1),
                Record::new()
                    .with("title", "new")
                    .with("points", "1.0")
                    .with("labels", vec![Value::from("a")]),
            )
            .await
            .unwrap();
        assert_eq!(replaced.get("title"), Some(&Value::from("new")));
        assert!(store
            .replace(&key("b1", 1), Record::new().with("title", "x"))
            .await
            .unwrap_err()
            .is_validation());
        assert!(store
            .replace(&key("b1", 9), task("b1", 9, "x"))
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_upsert_and_write() {
        let store = store().await;
        let first = store
            .upsert(task("b1", 1, "t"), Record::new().with("title", "changed"))
            .await
            .unwrap();
        assert_eq!(first.get("title"), Some(&Value::from("t")));
        let second = store
            .upsert(task("b1", 1, "t"), Record::new().with("title", "changed"))
            .await
            .unwrap();
        assert_eq!(second.get("title"), Some(&Value::from("changed")));
        assert!(second.get("rev").unwrap().as_i64() > first.get("rev").unwrap().as_i64());

        let written = store.write(task("b1", 1, "over")).await.unwrap();
        assert_eq!(written.get("title"), Some(&Value::from("over")));
        assert!(written.get("rev").unwrap().as_i64() > second.get("rev").unwrap().as_i64());
    }

    #[tokio::test]
    async fn test_destroy_and_clear() {
        let store = store().await;
        store.create(task("b1", 1, "t")).await.unwrap();
        store.destroy(&key("b1", 1)).await.unwrap();
        assert!(store.destroy(&key("b1", 1)).await.unwrap_err().is_not_found());
        store.clear(&key("b1", 1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let store = SqlStore::with_config(
            tasks(),
            SqliteConnection::open_in_memory().unwrap(),
            StoreConfig {
                page_size: 3,
                scan_chunk_size: 2,
                ..StoreConfig::default()
            },
        )
        .unwrap();
        store.ensure_table().await.unwrap();
        for seq in 0..7 {
            let board = if seq % 2 == 0 { "even" } else { "odd" };
            store.create(task(board, seq, "t")).await.unwrap();
        }

        let page = store
            .list(&Query::new("seq").descending().filter("board", "even"))
            .await
            .unwrap();
        let seqs: Vec<i64> = page
            .results
            .iter()
            .filter_map(|r| r.get("seq").and_then(Value::as_i64))
            .collect();
        assert_eq!(seqs, vec![6, 4, 2]);
        let next = page.next.unwrap();
        let last = store.list(&next).await.unwrap();
        assert_eq!(last.results.len(), 1);
        assert!(last.next.is_none());

        let none = store
            .list(&Query::new("seq").any_of("board", Vec::<Value>::new()))
            .await
            .unwrap();
        assert!(none.results.is_empty());

        let nulls = store
            .list(&Query::new("seq").filter("points", Value::Null))
            .await
            .unwrap();
        assert_eq!(nulls.results.len(), 3);
    }

    #[tokio::test]
    async fn test_scan_in_chunks() {
        let store = store().await;
        for seq in 0..5 {
            store.create(task("b", seq, "t")).await.unwrap();
        }
        let all = drain(store.scan(None).await.unwrap()).await.unwrap();
        assert_eq!(all.len(), 5);

        let ordered = drain(
            store
                .scan(Some(&Query::new("seq").descending()))
                .await
                .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(ordered[0].get("seq"), Some(&Value::Int(4)));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_statement() {
        let store = SqlStore::new(tasks(), SqliteConnection::open_in_memory().unwrap());
        // No table exists: a statement would fail with a backend error
        let err = store
            .create(Record::new().with("board", "b"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
