//! vstore - versioned record storage
//!
//! One contract ([`VersionedStore`]) for optimistic-concurrency CRUD, cursor
//! pagination, chunked scans and batch lookups, implemented over two
//! backends with very different query models.
//!
//! # Quick Start
//!
//! ```ignore
//! use vstore::{Field, Query, Record, Resource, Schema, VersionedStore};
//! use vstore::sql::{SqlStore, SqliteConnection};
//!
//! let schema = Schema::new()
//!     .field("sku", Field::id())
//!     .field("stock", Field::integer())
//!     .field("rev", Field::integer());
//! let products = Resource::new("products", schema, &["sku"], "rev")?;
//!
//! let store = SqlStore::new(products, SqliteConnection::open_in_memory()?);
//! store.ensure_table().await?;
//!
//! let created = store.create(Record::new().with("sku", "a1").with("stock", 3)).await?;
//! let page = store.list(&Query::new("stock")).await?;
//! ```
//!
//! # Layout
//!
//! - [`vstore_core`] (re-exported here): field codecs, schemas, resources,
//!   queries, pagination and the store contract
//! - [`sql`]: relational backend with a SQLite driver
//! - [`attr`]: attribute-store backend with an in-memory client

pub use vstore_core::*;

/// Relational backend
pub use vstore_sql as sql;

/// Attribute-store backend
pub use vstore_attr as attr;
