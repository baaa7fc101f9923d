//! SQLite driver adapter
//!
//! Wraps a `rusqlite::Connection` behind the [`SqlConnection`] traits.
//! Statements run on the blocking pool so the async caller never blocks.
//!
//! SQLite has no server-side cursors, so a cursor keeps its statement and
//! runs it again for every fetch, windowed by `LIMIT`/`OFFSET`. Only the
//! rows of the current fetch are ever held in memory. Rows written between
//! fetches can shift the window.
//!
//! `$n` placeholders are SQLite named parameters; SQLite numbers them in
//! order of first appearance, which is the order the statement builder
//! emits them, so binding positionally is exact.

use crate::connection::{SqlConnection, SqlCursor, SqlResult, SqlRow};
use crate::error::SqlError;
use crate::statement::Statement;
use crate::value::SqlValue;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Bool(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn read_value(column: &str, value: ValueRef<'_>) -> Result<SqlValue, SqlError> {
    Ok(match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(r) => SqlValue::Real(r),
        ValueRef::Text(bytes) => SqlValue::Text(
            String::from_utf8(bytes.to_vec()).map_err(|e| SqlError::Unsupported {
                column: column.to_string(),
                message: e.to_string(),
            })?,
        ),
        ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
    })
}

/// Run a statement on a locked connection
fn run(conn: &Connection, statement: &Statement) -> Result<SqlResult, SqlError> {
    let mut stmt = conn.prepare_cached(&statement.text)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let readonly = stmt.readonly();

    let mut rows = Vec::new();
    let mut cursor = stmt.query(rusqlite::params_from_iter(statement.params.iter()))?;
    while let Some(row) = cursor.next()? {
        let mut out = SqlRow::new();
        for (i, column) in columns.iter().enumerate() {
            out.insert(column.clone(), read_value(column, row.get_ref(i)?)?);
        }
        rows.push(out);
    }
    drop(cursor);

    let affected = if readonly { 0 } else { conn.changes() as u64 };
    Ok(SqlResult { rows, affected })
}

/// [`SqlConnection`] over a single SQLite connection
#[derive(Clone)]
pub struct SqliteConnection {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteConnection {
    /// Wrap an open connection
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, SqlError> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    /// Database file at `path`, created if missing
    pub fn open(path: &Path) -> Result<Self, SqlError> {
        Ok(Self::new(Connection::open(path)?))
    }

    async fn blocking(&self, statement: &Statement) -> Result<SqlResult, SqlError> {
        debug!(
            target: "vstore::sql",
            sql = %statement.text,
            params = statement.params.len(),
            "Executing statement"
        );
        let conn = Arc::clone(&self.conn);
        let statement = statement.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            run(&conn, &statement)
        })
        .await
        .map_err(|e| SqlError::Task(e.to_string()))?
    }
}

#[async_trait]
impl SqlConnection for SqliteConnection {
    async fn execute(&self, statement: &Statement) -> Result<SqlResult, SqlError> {
        self.blocking(statement).await
    }

    async fn open_cursor(&self, statement: &Statement) -> Result<Box<dyn SqlCursor>, SqlError> {
        Ok(Box::new(SqliteCursor {
            connection: self.clone(),
            statement: statement.clone(),
            position: 0,
            exhausted: false,
        }))
    }
}

/// Cursor that reads its statement one `LIMIT`/`OFFSET` window per fetch
struct SqliteCursor {
    connection: SqliteConnection,
    statement: Statement,
    position: usize,
    exhausted: bool,
}

impl SqliteCursor {
    /// `statement` restricted to `count` rows starting at the current position
    fn window(&self, count: usize) -> Statement {
        let limit = self.statement.params.len() + 1;
        let mut params = self.statement.params.clone();
        params.push(SqlValue::Integer(i64::try_from(count).unwrap_or(i64::MAX)));
        params.push(SqlValue::Integer(
            i64::try_from(self.position).unwrap_or(i64::MAX),
        ));
        Statement {
            text: format!(
                "SELECT * FROM ({}) LIMIT ${} OFFSET ${}",
                self.statement.text,
                limit,
                limit + 1
            ),
            params,
        }
    }
}

#[async_trait]
impl SqlCursor for SqliteCursor {
    async fn fetch(&mut self, count: usize) -> Result<Vec<SqlRow>, SqlError> {
        if self.exhausted || count == 0 {
            return Ok(Vec::new());
        }
        let rows = self.connection.blocking(&self.window(count)).await?.rows;
        self.position += rows.len();
        self.exhausted = rows.len() < count;
        Ok(rows)
    }

    async fn close(self: Box<Self>) -> Result<(), SqlError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{insert, select, OnConflict, Predicate};
    use vstore_core::Direction;

    async fn seeded() -> SqliteConnection {
        let conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute(&Statement::raw(
            "CREATE TABLE t (id TEXT PRIMARY KEY, n INTEGER, flag BOOLEAN)",
        ))
        .await
        .unwrap();
        for i in 0..5 {
            conn.execute(&insert(
                "t",
                &[
                    ("id".to_string(), SqlValue::Text(format!("r{}", i))),
                    ("n".to_string(), SqlValue::Integer(i)),
                    ("flag".to_string(), SqlValue::Bool(i % 2 == 0)),
                ],
                &OnConflict::Fail,
                false,
            ))
            .await
            .unwrap();
        }
        conn
    }

    #[tokio::test]
    async fn test_execute_returns_rows_and_counts() {
        let conn = seeded().await;
        let result = conn
            .execute(&select(
                "t",
                &[Predicate::Greater("n".to_string(), SqlValue::Integer(2))],
                None,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.affected, 0);
        assert_eq!(result.rows[0]["flag"], SqlValue::Integer(0));

        let result = conn
            .execute(&Statement {
                text: "UPDATE t SET n = n + 10 WHERE n < $1".to_string(),
                params: vec![SqlValue::Integer(3)],
            })
            .await
            .unwrap();
        assert_eq!(result.affected, 3);
    }

    #[tokio::test]
    async fn test_do_nothing_returns_no_rows() {
        let conn = seeded().await;
        let result = conn
            .execute(&insert(
                "t",
                &[
                    ("id".to_string(), SqlValue::Text("r0".to_string())),
                    ("n".to_string(), SqlValue::Integer(99)),
                ],
                &OnConflict::DoNothing,
                true,
            ))
            .await
            .unwrap();
        assert!(result.rows.is_empty());
    }

    #[tokio::test]
    async fn test_cursor_fetches_in_chunks() {
        let conn = seeded().await;
        let mut cursor = conn
            .open_cursor(&select("t", &[], None, None))
            .await
            .unwrap();
        assert_eq!(cursor.fetch(2).await.unwrap().len(), 2);
        assert_eq!(cursor.fetch(2).await.unwrap().len(), 2);
        assert_eq!(cursor.fetch(2).await.unwrap().len(), 1);
        assert!(cursor.fetch(2).await.unwrap().is_empty());
        cursor.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_cursor_reads_one_window_per_fetch() {
        let conn = seeded().await;
        let mut cursor = conn
            .open_cursor(&select(
                "t",
                &[Predicate::Greater("n".to_string(), SqlValue::Integer(0))],
                Some(("n", Direction::Asc)),
                None,
            ))
            .await
            .unwrap();
        let first = cursor.fetch(2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1]["n"], SqlValue::Integer(2));

        // Rows not yet reached are read from the table, not from a snapshot
        conn.execute(&insert(
            "t",
            &[
                ("id".to_string(), SqlValue::Text("r9".to_string())),
                ("n".to_string(), SqlValue::Integer(9)),
            ],
            &OnConflict::Fail,
            false,
        ))
        .await
        .unwrap();

        let rest = cursor.fetch(10).await.unwrap();
        let ns: Vec<&SqlValue> = rest.iter().map(|row| &row["n"]).collect();
        assert_eq!(
            ns,
            vec![&SqlValue::Integer(3), &SqlValue::Integer(4), &SqlValue::Integer(9)]
        );
        assert!(cursor.fetch(10).await.unwrap().is_empty());
        cursor.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_driver_errors_propagate() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        let err = conn
            .execute(&Statement::raw("SELECT * FROM missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, SqlError::Sqlite(_)));
    }
}
