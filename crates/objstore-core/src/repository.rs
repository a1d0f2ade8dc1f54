//! Typed repository over one object store.
//!
//! A `Repository<E, K>` translates typed calls into [`ObjectStoreDriver`]
//! calls against a single named store. It holds nothing but the driver and
//! the store name: no caching, retries or validation. Driver errors reach the
//! caller unchanged.
//!
//! Two operations are composed of two driver calls and are **not atomic**:
//!
//! - [`Repository::replace`] clears the store, then adds the new items. If the
//!   add fails, the store stays empty.
//! - [`Repository::get_first_or_default_by_key`] reads the minimum key, then
//!   looks it up. A concurrent delete in between yields `None`.
//!
//! Callers needing atomicity across those steps must get it from the driver.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::driver::ObjectStoreDriver;
use crate::error::DriverResult;
use crate::key::{KeyRange, StoreKey};
use crate::naming::to_camel_case;
use crate::status::StatusToken;
use crate::tracing::prefix;

/// A record type bound to the store it lives in.
pub trait Entity: Serialize + DeserializeOwned {
    /// Name of the object store holding this entity.
    const STORE_NAME: &'static str;
}

/// Typed accessor for the store holding entities `E` keyed by `K`.
pub struct Repository<E, K, D: ?Sized = dyn ObjectStoreDriver> {
    driver: Arc<D>,
    store_name: String,
    _marker: PhantomData<fn() -> (E, K)>,
}

impl<E, K, D: ?Sized> Clone for Repository<E, K, D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            store_name: self.store_name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E: Entity, K, D: ?Sized> Repository<E, K, D> {
    /// Repository over the store named by `E::STORE_NAME`.
    pub fn new(driver: Arc<D>) -> Self {
        Self::with_store_name(driver, E::STORE_NAME)
    }
}

impl<E, K, D: ?Sized> Repository<E, K, D> {
    /// Repository over an explicitly named store.
    pub fn with_store_name(driver: Arc<D>, store_name: impl Into<String>) -> Self {
        Self {
            driver,
            store_name: store_name.into(),
            _marker: PhantomData,
        }
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }
}

impl<E, K, D> Repository<E, K, D>
where
    E: Serialize + DeserializeOwned,
    K: Serialize + DeserializeOwned,
    D: ObjectStoreDriver + ?Sized,
{
    /// Insert all items.
    pub async fn add(&self, items: &[E]) -> DriverResult<StatusToken> {
        debug!("{} {} add: {} items", prefix::DB, self.store_name, items.len());
        let records = encode_items(items)?;
        self.driver.add_items(&self.store_name, records).await
    }

    /// Insert one item.
    pub async fn add_one(&self, item: &E) -> DriverResult<StatusToken> {
        self.add(std::slice::from_ref(item)).await
    }

    /// Clear the store, then insert `items`.
    ///
    /// Two driver calls, not atomic: if the insert fails the store is left
    /// empty.
    pub async fn replace(&self, items: &[E]) -> DriverResult<StatusToken> {
        debug!("{} {} replace: {} items", prefix::DB, self.store_name, items.len());
        self.delete_all().await?;
        self.add(items).await
    }

    /// Point lookup. Returns `None` if no record has this key.
    pub async fn get_by_key(&self, key: &K) -> DriverResult<Option<E>> {
        let key = StoreKey::encode(key)?;
        debug!("{} {} get_by_key: {}", prefix::DB, self.store_name, key);
        self.driver
            .get_by_key(&self.store_name, &key)
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn delete_by_key(&self, key: &K) -> DriverResult<StatusToken> {
        let key = StoreKey::encode(key)?;
        debug!("{} {} delete_by_key: {}", prefix::DB, self.store_name, key);
        self.driver.delete_by_key(&self.store_name, &key).await
    }

    /// Every entity, in primary-key order.
    pub async fn get_all(&self) -> DriverResult<Vec<E>> {
        debug!("{} {} get_all", prefix::DB, self.store_name);
        decode_all(self.driver.get_all(&self.store_name).await?)
    }

    /// Entities whose key lies in `[lower, upper]`, in key order.
    pub async fn get_range_by_key(&self, lower: &K, upper: &K) -> DriverResult<Vec<E>> {
        let range = KeyRange::bound(StoreKey::encode(lower)?, StoreKey::encode(upper)?)?;
        debug!(
            "{} {} get_range_by_key: {}..={}",
            prefix::DB,
            self.store_name,
            range.lower(),
            range.upper()
        );
        decode_all(self.driver.get_range(&self.store_name, &range).await?)
    }

    /// Entities whose `index_name` index equals `value`.
    pub async fn get_by_index<I>(&self, value: &I, index_name: &str) -> DriverResult<Vec<E>>
    where
        I: Serialize + ?Sized,
    {
        self.get_range_by_index(value, value, index_name, false)
            .await
    }

    /// Entities whose `index_name` index lies in `[lower, upper]`.
    ///
    /// With `is_range == false` only `lower` is matched and `upper` is ignored.
    pub async fn get_range_by_index<I>(
        &self,
        lower: &I,
        upper: &I,
        index_name: &str,
        is_range: bool,
    ) -> DriverResult<Vec<E>>
    where
        I: Serialize + ?Sized,
    {
        let index = to_camel_case(index_name);
        let lower = StoreKey::encode(lower)?;
        let upper = StoreKey::encode(upper)?;
        debug!(
            "{} {} get_by_index '{}': {}..={} (range: {})",
            prefix::DB,
            self.store_name,
            index,
            lower,
            upper,
            is_range
        );
        let records = self
            .driver
            .get_by_index(&self.store_name, &index, &lower, &upper, is_range)
            .await?;
        decode_all(records)
    }

    /// First entity whose `index_name` index equals `value`.
    pub async fn get_first_or_default_by_index<I>(
        &self,
        value: &I,
        index_name: &str,
    ) -> DriverResult<Option<E>>
    where
        I: Serialize + ?Sized,
    {
        Ok(self
            .get_by_index(value, index_name)
            .await?
            .into_iter()
            .next())
    }

    /// Entity with the smallest key, or `None` if the store is empty.
    ///
    /// Reads the minimum key, then looks it up: two driver calls, not atomic.
    pub async fn get_first_or_default_by_key(&self) -> DriverResult<Option<E>> {
        debug!("{} {} get_first_or_default_by_key", prefix::DB, self.store_name);
        let Some(key) = self.driver.get_min_key(&self.store_name).await? else {
            return Ok(None);
        };
        self.driver
            .get_by_key(&self.store_name, &key)
            .await?
            .map(decode)
            .transpose()
    }

    /// Largest key, or `None` if the store is empty.
    pub async fn get_max_key(&self) -> DriverResult<Option<K>> {
        debug!("{} {} get_max_key", prefix::DB, self.store_name);
        decode_key(self.driver.get_max_key(&self.store_name).await?)
    }

    /// Smallest key, or `None` if the store is empty.
    pub async fn get_min_key(&self) -> DriverResult<Option<K>> {
        debug!("{} {} get_min_key", prefix::DB, self.store_name);
        decode_key(self.driver.get_min_key(&self.store_name).await?)
    }

    /// Largest value of an index, or `None` if nothing is indexed.
    pub async fn get_max_index<I>(&self, index_name: &str) -> DriverResult<Option<I>>
    where
        I: DeserializeOwned,
    {
        let index = to_camel_case(index_name);
        debug!("{} {} get_max_index '{}'", prefix::DB, self.store_name, index);
        decode_key(self.driver.get_max_index(&self.store_name, &index).await?)
    }

    /// Smallest value of an index, or `None` if nothing is indexed.
    pub async fn get_min_index<I>(&self, index_name: &str) -> DriverResult<Option<I>>
    where
        I: DeserializeOwned,
    {
        let index = to_camel_case(index_name);
        debug!("{} {} get_min_index '{}'", prefix::DB, self.store_name, index);
        decode_key(self.driver.get_min_index(&self.store_name, &index).await?)
    }

    /// Replace existing records by key.
    pub async fn update(&self, items: &[E]) -> DriverResult<StatusToken> {
        debug!("{} {} update: {} items", prefix::DB, self.store_name, items.len());
        let records = encode_items(items)?;
        self.driver.update_items(&self.store_name, records).await
    }

    pub async fn update_one(&self, item: &E) -> DriverResult<StatusToken> {
        self.update(std::slice::from_ref(item)).await
    }

    /// Remove every record from the store.
    pub async fn delete_all(&self) -> DriverResult<StatusToken> {
        debug!("{} {} delete_all", prefix::DB, self.store_name);
        self.driver.delete_all(&self.store_name).await
    }
}

fn encode_items<E: Serialize>(items: &[E]) -> DriverResult<Vec<Value>> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(Into::into))
        .collect()
}

fn decode<E: DeserializeOwned>(record: Value) -> DriverResult<E> {
    Ok(serde_json::from_value(record)?)
}

fn decode_all<E: DeserializeOwned>(records: Vec<Value>) -> DriverResult<Vec<E>> {
    records.into_iter().map(decode).collect()
}

fn decode_key<T: DeserializeOwned>(key: Option<StoreKey>) -> DriverResult<Option<T>> {
    key.map(|k| k.decode()).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDriver;
    use crate::schema::{DatabaseModel, IndexSchema, StoreSchema};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        #[serde(rename = "createdAt")]
        created_at: i64,
    }

    impl Entity for Note {
        const STORE_NAME: &'static str = "Note";
    }

    fn notes() -> Repository<Note, String, MemoryDriver> {
        let driver = MemoryDriver::open(DatabaseModel::new("notes").store(
            StoreSchema::new("Note", "id").index(IndexSchema::new("createdAt", "createdAt")),
        ))
        .unwrap();
        Repository::new(Arc::new(driver))
    }

    #[test]
    fn test_store_name_from_entity() {
        assert_eq!(notes().store_name(), "Note");
    }

    #[tokio::test]
    async fn test_index_name_is_normalized() {
        let repo = notes();
        repo.add_one(&Note {
            id: "n1".into(),
            created_at: 5,
        })
        .await
        .unwrap();

        let hits = repo.get_by_index(&5, "CreatedAt").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(repo.get_max_index::<i64>("CreatedAt").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_dyn_driver() {
        let driver: Arc<dyn ObjectStoreDriver> = Arc::new(
            MemoryDriver::open(DatabaseModel::new("db").store(StoreSchema::new("Note", "id")))
                .unwrap(),
        );
        let repo: Repository<Note, String> = Repository::new(driver);
        assert_eq!(repo.get_min_key().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_key_decode_mismatch_is_serialization_error() {
        let repo: Repository<Note, i64, MemoryDriver> =
            Repository::with_store_name(notes().driver().clone(), "Note");
        repo.driver()
            .add_items("Note", vec![serde_json::json!({"id": "n1", "createdAt": 1})])
            .await
            .unwrap();

        let result = repo.get_min_key().await;
        assert!(matches!(
            result,
            Err(crate::error::DriverError::Serialization(_))
        ));
    }
}
