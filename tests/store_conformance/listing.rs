//! Pagination, filtering and scans

use crate::common::product;
use vstore::{drain, Direction, Query, Record, RecordScan, StoreConfig, Value, VersionedStore};

fn small_pages() -> StoreConfig {
    StoreConfig {
        page_size: 3,
        scan_chunk_size: 2,
        ..StoreConfig::default()
    }
}

conformance!(
    small_pages();
    pages_walk_in_order,
    descending_walk,
    filters_narrow_results,
    since_resumes_after_value,
    null_ordering_values_are_skipped,
    invalid_queries_are_rejected,
    scans_cover_everything,
    early_scan_close,
);

const STOCK: [(&str, &str, i64); 7] = [
    ("p1", "tools", 40),
    ("p2", "toys", -5),
    ("p3", "food", 12),
    ("p4", "tools", 0),
    ("p5", "toys", 7),
    ("p6", "tools", 1000),
    ("p7", "food", -300),
];

async fn seed<S: VersionedStore>(store: &S) {
    for (sku, category, stock) in STOCK {
        store.create(product(sku, category, stock)).await.unwrap();
    }
}

fn stocks(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .map(|r| match r.get("stock") {
            Some(Value::Int(n)) => *n,
            other => panic!("unexpected stock {:?}", other),
        })
        .collect()
}

/// Follow `next` until exhausted, returning each page's stock values
async fn walk<S: VersionedStore>(store: &S, query: Query) -> Vec<Vec<i64>> {
    let mut pages = Vec::new();
    let mut next = Some(query);
    while let Some(query) = next {
        let page = store.list(&query).await.unwrap();
        pages.push(stocks(&page.results));
        next = page.next;
    }
    pages
}

async fn pages_walk_in_order<S: VersionedStore>(store: &S) {
    seed(store).await;
    let pages = walk(store, Query::new("stock")).await;
    assert_eq!(
        pages,
        vec![vec![-300, -5, 0], vec![7, 12, 40], vec![1000]]
    );
}

async fn descending_walk<S: VersionedStore>(store: &S) {
    seed(store).await;
    let pages = walk(store, Query::new("stock").descending()).await;
    assert_eq!(
        pages,
        vec![vec![1000, 40, 12], vec![7, 0, -5], vec![-300]]
    );
}

async fn filters_narrow_results<S: VersionedStore>(store: &S) {
    seed(store).await;

    let tools = walk(store, Query::new("stock").filter("category", "tools")).await;
    assert_eq!(tools, vec![vec![0, 40, 1000], vec![]]);

    let mixed = store
        .list(&Query::new("stock").any_of("category", ["toys", "food"]))
        .await
        .unwrap();
    assert_eq!(stocks(&mixed.results), vec![-300, -5, 7]);
    assert!(mixed.next.is_some());

    let none = store
        .list(&Query::new("stock").any_of("category", Vec::<Value>::new()))
        .await
        .unwrap();
    assert!(none.results.is_empty());
    assert!(none.next.is_none());

    let exact = store
        .list(&Query::new("stock").filter("sku", "p5"))
        .await
        .unwrap();
    assert_eq!(stocks(&exact.results), vec![7]);
    assert!(exact.next.is_none());
}

async fn since_resumes_after_value<S: VersionedStore>(store: &S) {
    seed(store).await;
    let field = store.resource().schema().get("stock").unwrap();
    let cursor = field.encode_sortable(&Value::Int(7)).unwrap();

    let page = store
        .list(&Query::new("stock").since(cursor.clone()))
        .await
        .unwrap();
    assert_eq!(stocks(&page.results), vec![12, 40, 1000]);

    let page = store
        .list(&Query::new("stock").direction(Direction::Desc).since(cursor))
        .await
        .unwrap();
    assert_eq!(stocks(&page.results), vec![0, -5, -300]);
}

async fn null_ordering_values_are_skipped<S: VersionedStore>(store: &S) {
    store.create(product("a", "toys", 1)).await.unwrap();
    store
        .create(product("b", "toys", 2).with("released", "2023-05-01"))
        .await
        .unwrap();
    store
        .create(product("c", "toys", 3).with("released", "2021-12-31"))
        .await
        .unwrap();

    let page = store.list(&Query::new("released")).await.unwrap();
    assert_eq!(stocks(&page.results), vec![3, 2]);

    let unreleased = store
        .list(&Query::new("stock").filter("released", Value::Null))
        .await
        .unwrap();
    assert_eq!(stocks(&unreleased.results), vec![1]);
}

async fn invalid_queries_are_rejected<S: VersionedStore>(store: &S) {
    for query in [
        Query::new("colour"),
        Query::new("stock").filter("weight", 3i64),
        Query::new("stock").filter("category", "weapons"),
        Query::new("stock").since("not a cursor"),
    ] {
        let err = store.list(&query).await.unwrap_err();
        assert!(err.is_validation(), "{:?} gave {}", query, err);
    }
}

async fn scans_cover_everything<S: VersionedStore>(store: &S) {
    seed(store).await;
    let mut all = stocks(&drain(store.scan(None).await.unwrap()).await.unwrap());
    all.sort_unstable();
    assert_eq!(all, vec![-300, -5, 0, 7, 12, 40, 1000]);

    let query = Query::new("stock").filter("category", "toys");
    let toys = drain(store.scan(Some(&query)).await.unwrap()).await.unwrap();
    assert_eq!(stocks(&toys), vec![-5, 7]);
}

async fn early_scan_close<S: VersionedStore>(store: &S) {
    seed(store).await;
    let mut scan = store.scan(Some(&Query::new("stock"))).await.unwrap();
    let first = scan.next_chunk().await.unwrap().unwrap();
    assert_eq!(stocks(&first), vec![-300, -5]);
    scan.close().await.unwrap();

    let page = store.list(&Query::new("stock")).await.unwrap();
    assert_eq!(page.results.len(), 3);
}
