//! Browser tests for IndexedDbDriver through Repository
//!
//! Run with `wasm-pack test --headless --chrome crates/objstore-indexeddb`.

#![cfg(target_arch = "wasm32")]

use std::sync::Arc;

use objstore_core::{
    DatabaseModel, DriverError, Entity, IndexSchema, Operation, Repository, StoreSchema,
};
use objstore_indexeddb::IndexedDbDriver;
use serde::{Deserialize, Serialize};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Order {
    id: u32,
    customer: String,
    total: u32,
    #[serde(default)]
    tags: Vec<String>,
}

impl Entity for Order {
    const STORE_NAME: &'static str = "Order";
}

fn order(id: u32, customer: &str, total: u32) -> Order {
    Order {
        id,
        customer: customer.to_string(),
        total,
        tags: Vec::new(),
    }
}

/// Open a fresh database with an "Order" store
async fn open_repository(db_name: &str) -> Repository<Order, u32, IndexedDbDriver> {
    IndexedDbDriver::delete_database(db_name).await.unwrap();
    let model = DatabaseModel::new(db_name).store(
        StoreSchema::new("Order", "id")
            .index(IndexSchema::new("customer", "customer"))
            .index(IndexSchema::new("total", "total").unique(true))
            .index(IndexSchema::new("tags", "tags").multi_entry(true)),
    );
    Repository::new(Arc::new(IndexedDbDriver::open(model).await.unwrap()))
}

async fn cleanup(repo: Repository<Order, u32, IndexedDbDriver>) {
    let name = repo.driver().name().to_string();
    repo.driver().close();
    drop(repo);
    IndexedDbDriver::delete_database(&name).await.unwrap();
}

#[wasm_bindgen_test]
async fn test_add_and_get_by_key() {
    let repo = open_repository("objstore-test-add").await;

    let token = repo.add_one(&order(1, "alice", 10)).await.unwrap();
    assert_eq!(token.operation, Operation::Add);
    assert_eq!(token.affected, 1);

    let retrieved = repo.get_by_key(&1).await.unwrap();
    assert_eq!(retrieved, Some(order(1, "alice", 10)));
    assert_eq!(repo.get_by_key(&2).await.unwrap(), None);

    cleanup(repo).await;
}

#[wasm_bindgen_test]
async fn test_add_duplicate_key_rejected() {
    let repo = open_repository("objstore-test-dup").await;

    repo.add_one(&order(1, "alice", 10)).await.unwrap();
    let err = repo.add_one(&order(1, "bob", 20)).await.unwrap_err();
    assert!(matches!(err, DriverError::AlreadyExists { .. }));

    // The failed batch leaves nothing behind
    let err = repo
        .add(&[order(2, "bob", 20), order(1, "carol", 30)])
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::AlreadyExists { .. }));
    assert_eq!(repo.get_all().await.unwrap().len(), 1);

    cleanup(repo).await;
}

#[wasm_bindgen_test]
async fn test_unique_index_violation() {
    let repo = open_repository("objstore-test-unique").await;

    repo.add_one(&order(1, "alice", 10)).await.unwrap();
    let err = repo.add_one(&order(2, "bob", 10)).await.unwrap_err();
    assert!(matches!(err, DriverError::ConstraintViolation { .. }));
    assert_eq!(repo.get_by_key(&2).await.unwrap(), None);

    cleanup(repo).await;
}

#[wasm_bindgen_test]
async fn test_update_and_delete() {
    let repo = open_repository("objstore-test-update").await;

    repo.add(&[order(1, "alice", 10), order(2, "bob", 20)])
        .await
        .unwrap();

    let token = repo.update_one(&order(1, "alice", 15)).await.unwrap();
    assert_eq!(token.operation, Operation::Update);
    assert_eq!(repo.get_by_key(&1).await.unwrap().unwrap().total, 15);

    let err = repo.update_one(&order(9, "nobody", 90)).await.unwrap_err();
    assert!(matches!(err, DriverError::NotFound { .. }));

    let token = repo.delete_by_key(&2).await.unwrap();
    assert_eq!(token.affected, 1);
    let token = repo.delete_by_key(&2).await.unwrap();
    assert_eq!(token.affected, 0);

    cleanup(repo).await;
}

#[wasm_bindgen_test]
async fn test_ranges_and_indexes() {
    let repo = open_repository("objstore-test-range").await;

    repo.add(&[
        order(1, "alice", 10),
        order(2, "bob", 20),
        order(3, "alice", 30),
        order(4, "carol", 40),
    ])
    .await
    .unwrap();

    let ids: Vec<u32> = repo
        .get_range_by_key(&2, &3)
        .await
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(ids, vec![2, 3]);

    let alice = repo
        .get_by_index("alice", "customer")
        .await
        .unwrap();
    assert_eq!(alice.len(), 2);

    let mid: Vec<u32> = repo
        .get_range_by_index(&15u32, &35u32, "total", true)
        .await
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(mid, vec![2, 3]);

    let first = repo
        .get_first_or_default_by_index("carol", "customer")
        .await
        .unwrap();
    assert_eq!(first.map(|o| o.id), Some(4));

    let err = repo
        .get_by_index("x", "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::IndexNotFound { .. }));

    cleanup(repo).await;
}

#[wasm_bindgen_test]
async fn test_multi_entry_index() {
    let repo = open_repository("objstore-test-tags").await;

    let mut tagged = order(1, "alice", 10);
    tagged.tags = vec!["rush".into(), "gift".into()];
    repo.add(&[tagged, order(2, "bob", 20)]).await.unwrap();

    let gifts = repo.get_by_index("gift", "tags").await.unwrap();
    assert_eq!(gifts.len(), 1);
    assert_eq!(gifts[0].id, 1);

    cleanup(repo).await;
}

#[wasm_bindgen_test]
async fn test_extremal_keys() {
    let repo = open_repository("objstore-test-extremes").await;

    assert_eq!(repo.get_max_key().await.unwrap(), None);
    assert_eq!(repo.get_first_or_default_by_key().await.unwrap(), None);

    repo.add(&[order(5, "bob", 50), order(2, "alice", 20), order(9, "carol", 90)])
        .await
        .unwrap();

    assert_eq!(repo.get_max_key().await.unwrap(), Some(9));
    assert_eq!(repo.get_min_key().await.unwrap(), Some(2));
    assert_eq!(
        repo.get_max_index::<String>("customer").await.unwrap(),
        Some("carol".to_string())
    );
    assert_eq!(repo.get_min_index::<u32>("total").await.unwrap(), Some(20));
    assert_eq!(
        repo.get_first_or_default_by_key().await.unwrap().map(|o| o.id),
        Some(2)
    );

    cleanup(repo).await;
}

#[wasm_bindgen_test]
async fn test_replace_and_delete_all() {
    let repo = open_repository("objstore-test-replace").await;

    repo.add(&[order(1, "alice", 10), order(2, "bob", 20)])
        .await
        .unwrap();

    let token = repo.replace(&[order(7, "dave", 70)]).await.unwrap();
    assert_eq!(token.operation, Operation::Add);
    assert_eq!(repo.get_all().await.unwrap(), vec![order(7, "dave", 70)]);

    let token = repo.delete_all().await.unwrap();
    assert_eq!(token.operation, Operation::Clear);
    assert_eq!(token.affected, 1);
    assert!(repo.get_all().await.unwrap().is_empty());

    cleanup(repo).await;
}

#[wasm_bindgen_test]
async fn test_unknown_store() {
    let repo = open_repository("objstore-test-unknown").await;
    let other: Repository<Order, u32, IndexedDbDriver> =
        Repository::with_store_name(Arc::clone(repo.driver()), "Missing");

    let err = other.get_all().await.unwrap_err();
    assert!(matches!(err, DriverError::StoreNotFound(_)));

    drop(other);
    cleanup(repo).await;
}
