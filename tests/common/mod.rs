//! Shared fixtures for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use vstore::attr::{AttrStore, MemoryAttributeClient};
use vstore::sql::{SqlStore, SqliteConnection};
use vstore::{Field, Record, Resource, Schema, StoreConfig, Value};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output to the test harness (`RUST_LOG` filters it).
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Resources
// ============================================================================

/// Single-key resource covering most field kinds.
pub fn products() -> Resource {
    let schema = Schema::new()
        .field("sku", Field::id())
        .field("name", Field::trimmed())
        .field("category", Field::choice(&["tools", "toys", "food"]))
        .field("price", Field::decimal(2))
        .field("stock", Field::integer())
        .field("discontinued", Field::boolean())
        .field("released", Field::date().nullable())
        .field("bins", Field::integer().list().nullable())
        .field("rev", Field::integer());
    Resource::new("products", schema, &["sku"], "rev").expect("valid resource")
}

/// A full `products` record.
pub fn product(sku: &str, category: &str, stock: i64) -> Record {
    Record::new()
        .with("sku", sku)
        .with("name", format!("Product {}", sku))
        .with("category", category)
        .with("price", "9.99")
        .with("stock", stock)
        .with("discontinued", false)
        .with("released", Value::Null)
        .with("bins", Value::Null)
}

/// Key of a `products` record.
pub fn sku(sku: &str) -> Record {
    Record::new().with("sku", sku)
}

// ============================================================================
// Backends
// ============================================================================

/// Relational store on a fresh in-memory SQLite database.
pub async fn sql_store(resource: Resource, config: StoreConfig) -> SqlStore<SqliteConnection> {
    init_tracing();
    let connection = SqliteConnection::open_in_memory().expect("open sqlite");
    let store = SqlStore::with_config(resource, connection, config).expect("valid config");
    store.ensure_table().await.expect("create table");
    store
}

/// Attribute store on a fresh in-memory client that returns at most
/// `max_items` per select response.
pub async fn attr_store(
    resource: Resource,
    config: StoreConfig,
    max_items: usize,
) -> AttrStore<MemoryAttributeClient> {
    init_tracing();
    let client = Arc::new(MemoryAttributeClient::new().with_max_items_per_response(max_items));
    let store = AttrStore::with_config(resource, client, config).expect("valid config");
    store.ensure_domain().await.expect("create domain");
    store
}
