//! Attribute-store backend for vstore
//!
//! Implements [`vstore_core::VersionedStore`] over a schemaless service that
//! keeps flat string attributes per named item, supports one conditional
//! check per write and answers a restricted select language with
//! continuation tokens.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod item;
pub mod memory;
mod scan;
pub mod select;
mod store;

pub use client::{AttributeClient, Attributes, Expected, SelectOutput};
pub use error::AttrError;
pub use memory::MemoryAttributeClient;
pub use scan::AttrScan;
pub use select::{Condition, Select};
pub use store::AttrStore;
