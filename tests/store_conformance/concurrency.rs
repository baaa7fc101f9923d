//! Optimistic concurrency through the store contract

use crate::common::{product, sku};
use futures::future::join_all;
use vstore::{cas_update, Record, StoreConfig, Value, VersionedStore};

conformance!(
    StoreConfig::default();
    second_writer_on_same_version_loses,
    cas_update_applies_mutator,
    concurrent_cas_updates_all_land,
);

fn stock_of(record: &Record) -> i64 {
    match record.get("stock") {
        Some(Value::Int(n)) => *n,
        other => panic!("unexpected stock {:?}", other),
    }
}

async fn second_writer_on_same_version_loses<S: VersionedStore>(store: &S) {
    let created = store.create(product("a1", "tools", 10)).await.unwrap();
    let seen = store.resource().identity_of(&created);

    let first = store
        .update(&seen, Record::new().with("stock", 9i64))
        .await;
    let second = store
        .update(&seen, Record::new().with("stock", 8i64))
        .await;
    assert!(first.is_ok());
    assert!(second.unwrap_err().is_not_found());
    assert_eq!(stock_of(&store.retrieve(&sku("a1")).await.unwrap()), 9);
}

async fn cas_update_applies_mutator<S: VersionedStore>(store: &S) {
    store.create(product("a1", "tools", 10)).await.unwrap();
    let updated = cas_update(store, &sku("a1"), 3, |current| {
        Ok(Record::new().with("stock", stock_of(current) - 4))
    })
    .await
    .unwrap();
    assert_eq!(stock_of(&updated), 6);

    let err = cas_update(store, &sku("ghost"), 3, |_| Ok(Record::new()))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

async fn concurrent_cas_updates_all_land<S: VersionedStore>(store: &S) {
    store.create(product("a1", "tools", 0)).await.unwrap();
    let contenders = 5;
    let key = sku("a1");

    let results = join_all((0..contenders).map(|_| {
        cas_update(store, &key, contenders + 1, |current| {
            Ok(Record::new().with("stock", stock_of(current) + 1))
        })
    }))
    .await;
    for result in results {
        result.unwrap();
    }

    let stored = store.retrieve(&sku("a1")).await.unwrap();
    assert_eq!(stock_of(&stored), contenders as i64);
}
