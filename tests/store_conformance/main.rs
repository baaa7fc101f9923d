//! Store conformance tests
//!
//! Every check is written against the `VersionedStore` contract alone and
//! runs once per backend: SQLite for the relational store, the in-memory
//! client (capped at two items per select response) for the attribute store.

#[path = "../common/mod.rs"]
mod common;

/// One `#[tokio::test]` per backend for each listed check.
macro_rules! conformance {
    ($config:expr; $($check:ident),* $(,)?) => {
        mod sql {
            use super::*;

            $(
                #[tokio::test]
                async fn $check() {
                    let store = crate::common::sql_store(crate::common::products(), $config).await;
                    super::$check(&store).await;
                }
            )*
        }

        mod attr {
            use super::*;

            $(
                #[tokio::test]
                async fn $check() {
                    let store =
                        crate::common::attr_store(crate::common::products(), $config, 2).await;
                    super::$check(&store).await;
                }
            )*
        }
    };
}

mod batch;
mod concurrency;
mod crud;
mod fidelity;
mod listing;
