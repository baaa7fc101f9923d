//! Relational backend for vstore
//!
//! This crate implements [`vstore_core::VersionedStore`] over SQL:
//! - statement: parameterized SELECT / INSERT / UPDATE / DELETE builder
//! - value: field-to-column mapping
//! - connection: the driver capability traits (`SqlConnection`, `SqlCursor`)
//! - sqlite: rusqlite adapter
//! - SqlStore: the store itself, one statement per operation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod error;
mod scan;
pub mod sqlite;
pub mod statement;
mod store;
pub mod value;

pub use connection::{SqlConnection, SqlCursor, SqlResult, SqlRow};
pub use error::SqlError;
pub use scan::SqlScan;
pub use sqlite::SqliteConnection;
pub use statement::{quote_ident, Statement};
pub use store::SqlStore;
pub use value::SqlValue;
