//! Driver capability traits
//!
//! The store needs exactly two things from a relational driver: run a
//! parameterized statement and get rows plus an affected-row count back, and
//! open a cursor that yields rows in chunks.

use crate::error::SqlError;
use crate::statement::Statement;
use crate::value::SqlValue;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// One returned row, keyed by column name
pub type SqlRow = BTreeMap<String, SqlValue>;

/// Rows and affected-row count of one statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlResult {
    /// Returned rows (`SELECT` or `RETURNING`)
    pub rows: Vec<SqlRow>,
    /// Rows inserted, updated or deleted
    pub affected: u64,
}

/// A relational connection
#[async_trait]
pub trait SqlConnection: Send + Sync {
    /// Run one statement to completion
    async fn execute(&self, statement: &Statement) -> Result<SqlResult, SqlError>;

    /// Open a cursor over a query
    async fn open_cursor(&self, statement: &Statement) -> Result<Box<dyn SqlCursor>, SqlError>;
}

/// A chunked reader over a query's rows
///
/// Must be closed explicitly; dropping an open cursor leaks it on drivers
/// with server-side cursors.
#[async_trait]
pub trait SqlCursor: Send {
    /// Up to `count` further rows; fewer means the cursor is exhausted
    async fn fetch(&mut self, count: usize) -> Result<Vec<SqlRow>, SqlError>;

    /// Release the cursor
    async fn close(self: Box<Self>) -> Result<(), SqlError>;
}
