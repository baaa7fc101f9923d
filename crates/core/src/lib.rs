//! Core types and traits for vstore
//!
//! This crate defines everything the storage backends share:
//! - Value / Record: validated in-memory data
//! - Field: typed codec with validate, wire, URL-safe and sortable forms
//! - Schema / Resource: field sets plus identity and version configuration
//! - Query / Page: list requests and their results
//! - cursor: page boundaries and continuation values
//! - VersionedStore: the CRUD contract every backend implements
//! - Error: error type hierarchy
//! - StoreConfig: `vstore.toml` tuning

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod cursor;
pub mod error;
pub mod field;
pub mod query;
pub mod resource;
pub mod schema;
pub mod store;
pub mod value;
pub mod version;

pub use config::StoreConfig;
pub use cursor::{paginate, PAGE_SIZE};
pub use error::{BackendError, Error, PathSegment, Result, ValidationError};
pub use field::{Bounds, Field, Pattern};
pub use query::{Direction, Filter, Page, PreparedQuery, Query};
pub use resource::Resource;
pub use schema::Schema;
pub use store::{cas_update, drain, Amended, RecordScan, VersionedStore};
pub use value::{Record, Value};
