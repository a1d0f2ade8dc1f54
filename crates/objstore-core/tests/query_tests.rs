//! Range, index and extremal-key tests for Repository over MemoryDriver

use std::sync::Arc;

use objstore_core::{
    DatabaseModel, DriverError, Entity, IndexSchema, MemoryDriver, Repository, StoreSchema,
};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Order {
    id: u32,
    total: u32,
    customer_name: String,
}

impl Entity for Order {
    const STORE_NAME: &'static str = "Order";
}

fn order(id: u32, total: u32, customer: &str) -> Order {
    Order {
        id,
        total,
        customer_name: customer.to_string(),
    }
}

fn create_repository() -> Repository<Order, u32, MemoryDriver> {
    let model = DatabaseModel::new("shop").store(
        StoreSchema::new("Order", "id")
            .index(IndexSchema::new("total", "total"))
            .index(IndexSchema::new("customerName", "customerName")),
    );
    Repository::new(Arc::new(MemoryDriver::open(model).unwrap()))
}

async fn seeded_repository() -> Repository<Order, u32, MemoryDriver> {
    let repo = create_repository();
    repo.add(&[
        order(3, 30, "carol"),
        order(1, 10, "alice"),
        order(4, 10, "bob"),
        order(2, 5, "alice"),
    ])
    .await
    .unwrap();
    repo
}

#[tokio::test]
async fn test_get_all_in_key_order() {
    let repo = seeded_repository().await;
    let ids: Vec<u32> = repo.get_all().await.unwrap().iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_get_range_by_key_is_inclusive() {
    let repo = seeded_repository().await;
    let ids: Vec<u32> = repo
        .get_range_by_key(&2, &3)
        .await
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(ids, vec![2, 3]);
}

#[tokio::test]
async fn test_get_range_by_key_inverted_bounds() {
    let repo = seeded_repository().await;
    let result = repo.get_range_by_key(&3, &2).await;
    assert!(matches!(result, Err(DriverError::InvalidKey(_))));
}

#[tokio::test]
async fn test_get_by_index() {
    let repo = seeded_repository().await;
    let hits = repo.get_by_index("alice", "CustomerName").await.unwrap();
    assert_eq!(hits, vec![order(1, 10, "alice"), order(2, 5, "alice")]);
}

#[tokio::test]
async fn test_get_by_index_matches_equality_range() {
    let repo = seeded_repository().await;
    let by_index = repo.get_by_index(&10, "total").await.unwrap();
    let by_range = repo
        .get_range_by_index(&10, &10, "total", false)
        .await
        .unwrap();
    assert_eq!(by_index, by_range);
    assert_eq!(by_index.len(), 2);
}

#[tokio::test]
async fn test_get_range_by_index() {
    let repo = seeded_repository().await;
    let ids: Vec<u32> = repo
        .get_range_by_index(&5, &10, "Total", true)
        .await
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();
    // Index order first, then primary key
    assert_eq!(ids, vec![2, 1, 4]);
}

#[tokio::test]
async fn test_non_range_ignores_upper_bound() {
    let repo = seeded_repository().await;
    let hits = repo
        .get_range_by_index(&5, &30, "total", false)
        .await
        .unwrap();
    assert_eq!(hits, vec![order(2, 5, "alice")]);
}

#[tokio::test]
async fn test_get_first_or_default_by_index() {
    let repo = seeded_repository().await;
    assert_eq!(
        repo.get_first_or_default_by_index(&10, "total").await.unwrap(),
        Some(order(1, 10, "alice"))
    );
    assert_eq!(
        repo.get_first_or_default_by_index(&77, "total").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_get_first_or_default_by_key() {
    let repo = create_repository();
    assert_eq!(repo.get_first_or_default_by_key().await.unwrap(), None);

    repo.add(&[order(7, 1, "x"), order(3, 2, "y")]).await.unwrap();
    let min_key = repo.get_min_key().await.unwrap();
    let first = repo.get_first_or_default_by_key().await.unwrap();
    assert_eq!(min_key, Some(3));
    assert_eq!(first, Some(order(3, 2, "y")));
}

#[tokio::test]
async fn test_min_max_key() {
    let repo = create_repository();
    assert_eq!(repo.get_min_key().await.unwrap(), None);
    assert_eq!(repo.get_max_key().await.unwrap(), None);

    repo.add(&[order(1, 10, "a"), order(2, 5, "b")]).await.unwrap();
    assert_eq!(repo.get_min_key().await.unwrap(), Some(1));
    assert_eq!(repo.get_max_key().await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_min_max_index() {
    let repo = create_repository();
    assert_eq!(repo.get_max_index::<u32>("total").await.unwrap(), None);

    repo.add(&[order(1, 10, "a"), order(2, 5, "b")]).await.unwrap();
    assert_eq!(repo.get_max_index::<u32>("total").await.unwrap(), Some(10));
    assert_eq!(repo.get_min_index::<u32>("Total").await.unwrap(), Some(5));
    assert_eq!(
        repo.get_max_index::<String>("customerName").await.unwrap(),
        Some("b".to_string())
    );
}

#[tokio::test]
async fn test_unknown_index() {
    let repo = seeded_repository().await;
    let result = repo.get_by_index(&1, "missing").await;
    assert_eq!(
        result,
        Err(DriverError::IndexNotFound {
            store: "Order".into(),
            index: "missing".into(),
        })
    );
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Visit {
    page: String,
    seq: u32,
}

#[tokio::test]
async fn test_string_keys() {
    let model = DatabaseModel::new("analytics").store(StoreSchema::new("visits", "page"));
    let repo: Repository<Visit, String, MemoryDriver> =
        Repository::with_store_name(Arc::new(MemoryDriver::open(model).unwrap()), "visits");

    repo.add(&[
        Visit { page: "b".into(), seq: 2 },
        Visit { page: "a".into(), seq: 1 },
        Visit { page: "c".into(), seq: 3 },
    ])
    .await
    .unwrap();

    assert_eq!(repo.get_min_key().await.unwrap(), Some("a".to_string()));
    let pages: Vec<String> = repo
        .get_range_by_key(&"a".to_string(), &"b".to_string())
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.page)
        .collect();
    assert_eq!(pages, vec!["a", "b"]);
}
