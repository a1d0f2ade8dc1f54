//! Object store driver trait definition

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DriverResult;
use crate::key::{KeyRange, StoreKey};
use crate::status::StatusToken;

/// Primitive operations of an object store engine.
///
/// This trait is the seam between the typed [`Repository`](crate::Repository)
/// and a storage backend. Implementations exist for:
/// - Browser: IndexedDB (`objstore-indexeddb`, WASM only)
/// - Testing/native: in-memory ([`MemoryDriver`](crate::MemoryDriver))
///
/// Records cross this boundary as JSON values; keys as [`StoreKey`]s. Every
/// method addresses one named store. Futures are not required to be `Send`
/// so that browser handles (which are `!Send`) can be held across awaits.
#[async_trait(?Send)]
pub trait ObjectStoreDriver {
    /// Insert records.
    ///
    /// Fails with `DriverError::AlreadyExists` if a key is already stored.
    async fn add_items(&self, store: &str, items: Vec<Value>) -> DriverResult<StatusToken>;

    /// Replace existing records by key.
    ///
    /// Fails with `DriverError::NotFound` if a key is not stored.
    async fn update_items(&self, store: &str, items: Vec<Value>) -> DriverResult<StatusToken>;

    /// Point lookup. Returns `None` if not found.
    async fn get_by_key(&self, store: &str, key: &StoreKey) -> DriverResult<Option<Value>>;

    /// Delete the record with this key. Deleting a missing key is not an error.
    async fn delete_by_key(&self, store: &str, key: &StoreKey) -> DriverResult<StatusToken>;

    /// All records in primary-key order.
    async fn get_all(&self, store: &str) -> DriverResult<Vec<Value>>;

    /// Records whose primary key falls in `range`, in primary-key order.
    async fn get_range(&self, store: &str, range: &KeyRange) -> DriverResult<Vec<Value>>;

    /// Records matched through a secondary index.
    ///
    /// With `is_range` the inclusive range `[lower, upper]` is scanned;
    /// otherwise only records whose index key equals `lower` match.
    /// Results are ordered by index key, then primary key.
    async fn get_by_index(
        &self,
        store: &str,
        index: &str,
        lower: &StoreKey,
        upper: &StoreKey,
        is_range: bool,
    ) -> DriverResult<Vec<Value>>;

    /// Largest primary key, or `None` if the store is empty.
    async fn get_max_key(&self, store: &str) -> DriverResult<Option<StoreKey>>;

    /// Smallest primary key, or `None` if the store is empty.
    async fn get_min_key(&self, store: &str) -> DriverResult<Option<StoreKey>>;

    /// Largest index key, or `None` if nothing is indexed.
    async fn get_max_index(&self, store: &str, index: &str) -> DriverResult<Option<StoreKey>>;

    /// Smallest index key, or `None` if nothing is indexed.
    async fn get_min_index(&self, store: &str, index: &str) -> DriverResult<Option<StoreKey>>;

    /// Remove every record from the store.
    async fn delete_all(&self, store: &str) -> DriverResult<StatusToken>;
}

/// Build the key range an index query scans.
///
/// Equality lookups ignore `upper`.
pub fn index_range(lower: &StoreKey, upper: &StoreKey, is_range: bool) -> DriverResult<KeyRange> {
    if is_range {
        KeyRange::bound(lower.clone(), upper.clone())
    } else {
        Ok(KeyRange::only(lower.clone()))
    }
}
