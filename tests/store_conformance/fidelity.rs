//! Stored values read back exactly as written

use crate::common::{product, sku};
use vstore::{Query, Record, StoreConfig, Value, VersionedStore};

conformance!(
    StoreConfig::default();
    empty_list_stays_apart_from_null,
    wide_decimals_keep_every_digit,
);

async fn empty_list_stays_apart_from_null<S: VersionedStore>(store: &S) {
    let empty = Value::List(vec![]);
    let created = store
        .create(product("a1", "tools", 1).with("bins", empty.clone()))
        .await
        .unwrap();
    assert_eq!(created.get("bins"), Some(&empty));
    assert_eq!(store.retrieve(&sku("a1")).await.unwrap().get("bins"), Some(&empty));

    store.create(product("b1", "tools", 1)).await.unwrap();
    let unset = store.retrieve(&sku("b1")).await.unwrap();
    assert_eq!(unset.get("bins"), Some(&Value::Null));

    let filled = store
        .update(&sku("b1"), Record::new().with("bins", vec![Value::Int(4), Value::Int(-2)]))
        .await
        .unwrap();
    assert_eq!(
        filled.get("bins"),
        Some(&Value::List(vec![Value::Int(4), Value::Int(-2)]))
    );
    let emptied = store
        .update(&sku("b1"), Record::new().with("bins", empty.clone()))
        .await
        .unwrap();
    assert_eq!(emptied.get("bins"), Some(&empty));
    assert_eq!(store.retrieve(&sku("b1")).await.unwrap().get("bins"), Some(&empty));
}

async fn wide_decimals_keep_every_digit<S: VersionedStore>(store: &S) {
    let prices = [
        ("a", "12345678901234567.89"),
        ("b", "-0.01"),
        ("c", "12345678901234567.88"),
        ("d", "1234567890123.45"),
    ];
    for (name, price) in prices {
        let created = store
            .create(product(name, "food", 1).with("price", price))
            .await
            .unwrap();
        assert_eq!(created.get("price"), Some(&Value::from(price)));
        let stored = store.retrieve(&sku(name)).await.unwrap();
        assert_eq!(stored.get("price"), Some(&Value::from(price)));
    }

    let page = store.list(&Query::new("price")).await.unwrap();
    let ordered: Vec<&Value> = page.results.iter().filter_map(|r| r.get("price")).collect();
    assert_eq!(
        ordered,
        vec![
            &Value::from("-0.01"),
            &Value::from("1234567890123.45"),
            &Value::from("12345678901234567.88"),
            &Value::from("12345678901234567.89"),
        ]
    );

    let exact = store
        .list(&Query::new("stock").filter("price", "12345678901234567.88"))
        .await
        .unwrap();
    assert_eq!(exact.results.len(), 1);
    assert_eq!(exact.results[0].get("sku"), Some(&Value::from("c")));
}
