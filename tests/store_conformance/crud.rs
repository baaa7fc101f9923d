//! Single-record operations

use crate::common::{product, sku};
use vstore::{Record, StoreConfig, Value, VersionedStore};

conformance!(
    StoreConfig::default();
    create_then_retrieve,
    duplicate_create_conflicts,
    missing_record_is_not_found,
    invalid_input_is_rejected_before_io,
    update_merges_and_advances_version,
    stale_version_is_not_found,
    replace_keeps_key_and_swaps_fields,
    amend_reports_changes_and_version,
    upsert_creates_then_updates,
    write_overwrites_unconditionally,
    destroy_then_clear,
);

async fn create_then_retrieve<S: VersionedStore>(store: &S) {
    let created = store.create(product("a1", "tools", 4)).await.unwrap();
    assert_eq!(created.get("name"), Some(&Value::from("Product a1")));
    assert_eq!(created.get("price"), Some(&Value::from("9.99")));
    assert!(matches!(created.get("rev"), Some(Value::Int(_))));

    let by_key = store.retrieve(&sku("a1")).await.unwrap();
    assert_eq!(by_key, created);

    let identity = store.resource().identity_of(&created);
    let by_identity = store.retrieve(&identity).await.unwrap();
    assert_eq!(by_identity, created);
}

async fn duplicate_create_conflicts<S: VersionedStore>(store: &S) {
    store.create(product("a1", "tools", 4)).await.unwrap();
    let err = store.create(product("a1", "toys", 9)).await.unwrap_err();
    assert!(err.is_conflict(), "{}", err);

    let stored = store.retrieve(&sku("a1")).await.unwrap();
    assert_eq!(stored.get("category"), Some(&Value::from("tools")));
}

async fn missing_record_is_not_found<S: VersionedStore>(store: &S) {
    let err = store.retrieve(&sku("ghost")).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "products not found: sku=ghost");

    let err = store
        .update(&sku("ghost"), Record::new().with("stock", 1i64))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

async fn invalid_input_is_rejected_before_io<S: VersionedStore>(store: &S) {
    let err = store
        .create(product("a1", "weapons", 1))
        .await
        .unwrap_err();
    assert!(err.is_validation(), "{}", err);

    let err = store.retrieve(&sku("bad sku!")).await.unwrap_err();
    assert!(err.is_validation(), "{}", err);

    let err = store
        .create(Record::new().with("sku", "a1"))
        .await
        .unwrap_err();
    assert!(err.is_validation(), "{}", err);
    assert!(store.retrieve(&sku("a1")).await.unwrap_err().is_not_found());
}

async fn update_merges_and_advances_version<S: VersionedStore>(store: &S) {
    let created = store.create(product("a1", "tools", 4)).await.unwrap();
    let identity = store.resource().identity_of(&created);

    let updated = store
        .update(&identity, Record::new().with("stock", 7i64).with("rev", 1i64))
        .await
        .unwrap();
    assert_eq!(updated.get("stock"), Some(&Value::Int(7)));
    assert_eq!(updated.get("name"), created.get("name"));

    let (Some(Value::Int(before)), Some(Value::Int(after))) =
        (created.get("rev"), updated.get("rev"))
    else {
        panic!("integer versions expected");
    };
    assert!(after > before, "{} should exceed {}", after, before);
    assert_eq!(store.retrieve(&sku("a1")).await.unwrap(), updated);
}

async fn stale_version_is_not_found<S: VersionedStore>(store: &S) {
    let created = store.create(product("a1", "tools", 4)).await.unwrap();
    let stale = store.resource().identity_of(&created);
    store
        .update(&stale, Record::new().with("stock", 5i64))
        .await
        .unwrap();

    let err = store
        .update(&stale, Record::new().with("stock", 6i64))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let err = store.destroy(&stale).await.unwrap_err();
    assert!(err.is_not_found());

    let stored = store.retrieve(&sku("a1")).await.unwrap();
    assert_eq!(stored.get("stock"), Some(&Value::Int(5)));
}

async fn replace_keeps_key_and_swaps_fields<S: VersionedStore>(store: &S) {
    store.create(product("a1", "tools", 4)).await.unwrap();

    let replaced = store
        .replace(
            &sku("a1"),
            product("a1", "toys", 2).with("name", "Renamed"),
        )
        .await
        .unwrap();
    assert_eq!(replaced.get("sku"), Some(&Value::from("a1")));
    assert_eq!(replaced.get("name"), Some(&Value::from("Renamed")));
    assert_eq!(replaced.get("category"), Some(&Value::from("toys")));

    let err = store
        .replace(&sku("a1"), product("b2", "toys", 2))
        .await
        .unwrap_err();
    assert!(err.is_validation(), "{}", err);

    let err = store
        .replace(&sku("ghost"), product("ghost", "toys", 2))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

async fn amend_reports_changes_and_version<S: VersionedStore>(store: &S) {
    store.create(product("a1", "tools", 4)).await.unwrap();
    let amended = store
        .amend(&sku("a1"), Record::new().with("discontinued", true))
        .await
        .unwrap();
    assert_eq!(amended.changes, Record::new().with("discontinued", true));

    let stored = store.retrieve(&sku("a1")).await.unwrap();
    assert_eq!(stored.get("discontinued"), Some(&Value::Bool(true)));
    assert_eq!(store.resource().version_of(&stored), Some(&amended.version));
}

async fn upsert_creates_then_updates<S: VersionedStore>(store: &S) {
    let changes = Record::new().with("stock", 50i64);
    let first = store
        .upsert(product("a1", "tools", 4), changes.clone())
        .await
        .unwrap();
    assert_eq!(first.get("stock"), Some(&Value::Int(4)));

    let second = store
        .upsert(product("a1", "tools", 4), changes)
        .await
        .unwrap();
    assert_eq!(second.get("stock"), Some(&Value::Int(50)));
    assert_eq!(second.get("category"), Some(&Value::from("tools")));
    assert_ne!(second.get("rev"), first.get("rev"));
}

async fn write_overwrites_unconditionally<S: VersionedStore>(store: &S) {
    let fresh = store.write(product("a1", "tools", 4)).await.unwrap();
    assert_eq!(store.retrieve(&sku("a1")).await.unwrap(), fresh);

    let written = store
        .write(product("a1", "food", 0).with("released", "2024-02-29"))
        .await
        .unwrap();
    assert_eq!(written.get("category"), Some(&Value::from("food")));
    assert_ne!(written.get("rev"), fresh.get("rev"));

    let stored = store.retrieve(&sku("a1")).await.unwrap();
    assert_eq!(stored, written);
    assert!(matches!(stored.get("released"), Some(Value::Date(_))));
}

async fn destroy_then_clear<S: VersionedStore>(store: &S) {
    let created = store.create(product("a1", "tools", 4)).await.unwrap();
    store
        .destroy(&store.resource().identity_of(&created))
        .await
        .unwrap();
    assert!(store.retrieve(&sku("a1")).await.unwrap_err().is_not_found());

    assert!(store.destroy(&sku("a1")).await.unwrap_err().is_not_found());
    store.clear(&sku("a1")).await.unwrap();
}
