//! Batch lookups

use crate::common::{product, sku};
use vstore::{Record, StoreConfig, Value, VersionedStore};

conformance!(
    StoreConfig::default();
    batch_retrieve_keeps_input_order,
    batch_retrieve_fails_on_invalid_identity,
);

async fn batch_retrieve_keeps_input_order<S: VersionedStore>(store: &S) {
    for name in ["a", "b", "c"] {
        store.create(product(name, "toys", 1)).await.unwrap();
    }
    let wanted = vec![sku("c"), sku("missing"), sku("a"), sku("c")];
    let found = store.batch_retrieve(&wanted).await.unwrap();

    let skus: Vec<Option<&Value>> = found
        .iter()
        .map(|r| r.as_ref().and_then(|r| r.get("sku")))
        .collect();
    assert_eq!(
        skus,
        vec![
            Some(&Value::from("c")),
            None,
            Some(&Value::from("a")),
            Some(&Value::from("c")),
        ]
    );
    assert!(store.batch_retrieve(&[]).await.unwrap().is_empty());
}

async fn batch_retrieve_fails_on_invalid_identity<S: VersionedStore>(store: &S) {
    store.create(product("a", "toys", 1)).await.unwrap();
    let wanted = vec![sku("a"), Record::new().with("sku", "no spaces allowed")];
    let err = store.batch_retrieve(&wanted).await.unwrap_err();
    assert!(err.is_validation(), "{}", err);
}
