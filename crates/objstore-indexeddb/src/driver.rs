//! IndexedDB implementation of `ObjectStoreDriver`.
//!
//! Every driver call runs in one transaction scoped to one object store:
//! readonly for reads, readwrite for writes. Multi-record adds and updates
//! are issued in a single transaction, so a failing record aborts the batch.
//!
//! Adds and updates check key existence in a separate readonly transaction
//! first (to report `AlreadyExists` / `NotFound` with the offending key), so
//! a concurrent writer can slip in between the check and the write.

use async_trait::async_trait;
use objstore_core::driver::{index_range, ObjectStoreDriver};
use objstore_core::schema::{extract_key_path, DatabaseModel, StoreSchema};
use objstore_core::tracing::prefix;
use objstore_core::{DriverError, DriverResult, KeyRange, Operation, StatusToken, StoreKey};
use serde_json::Value;
use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    IdbCursor, IdbCursorDirection, IdbDatabase, IdbIndex, IdbObjectStore, IdbRequest,
    IdbTransaction, IdbTransactionMode,
};

use crate::convert::{js_to_key, js_to_record, js_to_records, key_to_js, range_to_js, record_to_js};
use crate::error::{js_error_message, IndexedDbError};
use crate::idb;

/// IndexedDB-backed object store driver for browser WASM.
///
/// Opened from a [`DatabaseModel`]; only stores declared in the model are
/// addressable. All methods are async because IndexedDB is callback-based.
pub struct IndexedDbDriver {
    db: IdbDatabase,
    model: DatabaseModel,
}

fn request_error(op: &'static str) -> impl FnOnce(JsValue) -> IndexedDbError {
    move |e| IndexedDbError::Request(format!("IDB {}: {}", op, js_error_message(&e)))
}

impl IndexedDbDriver {
    /// Open or create the database described by `model`.
    ///
    /// Stores and indexes the database lacks are created during the version
    /// upgrade; existing ones are left untouched.
    pub async fn open(model: DatabaseModel) -> crate::Result<Self> {
        model.validate()?;
        let db = idb::open_database(&model).await?;
        info!(
            "{} IndexedDB driver ready: '{}' ({} stores)",
            prefix::DB_OPEN,
            model.name,
            model.stores.len()
        );
        Ok(Self { db, model })
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.model.name
    }

    /// The model this driver was opened with.
    pub fn model(&self) -> &DatabaseModel {
        &self.model
    }

    /// Close the database connection.
    pub fn close(&self) {
        idb::close_database(&self.db);
        info!("{} Closed IndexedDB '{}'", prefix::DB_CLOSE, self.model.name);
    }

    /// Delete a database (for testing/cleanup).
    pub async fn delete_database(db_name: &str) -> crate::Result<()> {
        idb::delete_database(db_name).await
    }

    fn schema(&self, store: &str) -> DriverResult<&StoreSchema> {
        self.model
            .find_store(store)
            .ok_or_else(|| DriverError::StoreNotFound(store.to_string()))
    }

    /// Begin a transaction and arm its completion future.
    fn begin(
        &self,
        store: &str,
        mode: IdbTransactionMode,
    ) -> DriverResult<(IdbTransaction, IdbObjectStore, JsFuture)> {
        self.schema(store)?;
        let (tx, object_store) = idb::begin_transaction(&self.db, store, mode)?;
        let done = idb::transaction_future(&tx);
        Ok((tx, object_store, done))
    }

    fn index(&self, object_store: &IdbObjectStore, store: &str, name: &str) -> DriverResult<IdbIndex> {
        let missing = || DriverError::IndexNotFound {
            store: store.to_string(),
            index: name.to_string(),
        };
        if !object_store.index_names().contains(name) {
            return Err(missing());
        }
        object_store.index(name).map_err(|_| missing())
    }

    /// For each key, whether a record with that key is stored.
    async fn key_presence(&self, store: &str, keys: &[StoreKey]) -> DriverResult<Vec<bool>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let (_tx, object_store, done) = self.begin(store, IdbTransactionMode::Readonly)?;
        let mut pending = Vec::with_capacity(keys.len());
        for key in keys {
            let req = object_store
                .count_with_key(&key_to_js(key))
                .map_err(request_error("count"))?;
            pending.push(idb::request_future(&req));
        }

        let mut presence = Vec::with_capacity(keys.len());
        for fut in pending {
            let count = idb::settle_request(fut).await?;
            presence.push(count.as_f64().unwrap_or(0.0) > 0.0);
        }
        idb::settle_transaction(done).await?;
        Ok(presence)
    }

    /// Issue one write request per record in a single readwrite transaction.
    ///
    /// A `ConstraintError` comes back as `IndexedDbError::Constraint` for the
    /// caller to classify.
    async fn write_all(
        &self,
        store: &str,
        items: &[Value],
        write: fn(&IdbObjectStore, &JsValue) -> Result<IdbRequest, JsValue>,
    ) -> crate::Result<()> {
        let records = items
            .iter()
            .map(record_to_js)
            .collect::<crate::Result<Vec<_>>>()?;

        let (tx, object_store, done) = self.begin(store, IdbTransactionMode::Readwrite)?;
        let mut pending = Vec::with_capacity(records.len());
        for record in &records {
            match write(&object_store, record) {
                Ok(req) => pending.push(idb::request_future(&req)),
                Err(e) => {
                    // Earlier requests would otherwise commit
                    let _ = tx.abort();
                    return Err(request_error("write")(e));
                }
            }
        }

        for fut in pending {
            idb::settle_request(fut).await?;
        }
        idb::settle_transaction(done).await
    }

    async fn extreme_key(
        &self,
        store: &str,
        index: Option<&str>,
        direction: IdbCursorDirection,
    ) -> DriverResult<Option<StoreKey>> {
        let (_tx, object_store, done) = self.begin(store, IdbTransactionMode::Readonly)?;
        let req = match index {
            Some(name) => self
                .index(&object_store, store, name)?
                .open_key_cursor_with_range_and_direction(&JsValue::NULL, direction),
            None => object_store.open_key_cursor_with_range_and_direction(&JsValue::NULL, direction),
        }
        .map_err(request_error("openKeyCursor"))?;

        let result = idb::settle_request(idb::request_future(&req)).await?;
        let key = if result.is_null() || result.is_undefined() {
            None
        } else {
            let cursor: IdbCursor = result.unchecked_into();
            let key = cursor.key().map_err(request_error("cursor key"))?;
            Some(js_to_key(&key)?)
        };
        idb::settle_transaction(done).await?;
        Ok(key)
    }
}

/// Primary key of a record, or `None` when the store generates it.
fn record_key(schema: &StoreSchema, record: &Value) -> DriverResult<Option<StoreKey>> {
    match extract_key_path(record, &schema.key_path) {
        Some(value) => StoreKey::from_json(value).map(Some),
        None if schema.auto_increment => Ok(None),
        None => Err(DriverError::InvalidKey(format!(
            "record has no key at path '{}' in store '{}'",
            schema.key_path, schema.name
        ))),
    }
}

fn unique_index_names(schema: &StoreSchema) -> Vec<&str> {
    schema
        .indexes
        .iter()
        .filter(|i| i.unique)
        .map(|i| i.name.as_str())
        .collect()
}

/// Classify a ConstraintError raised by an add.
///
/// `existing` is a batch key found stored after the failure, which means a
/// concurrent writer took it between the existence check and the write.
fn add_conflict(
    schema: &StoreSchema,
    existing: Option<&StoreKey>,
    keys: &[StoreKey],
) -> DriverError {
    let unique = unique_index_names(schema);
    match existing {
        Some(key) => DriverError::AlreadyExists {
            store: schema.name.clone(),
            key: key.to_string(),
        },
        None if unique.is_empty() => DriverError::AlreadyExists {
            store: schema.name.clone(),
            key: keys
                .first()
                .map(StoreKey::to_string)
                .unwrap_or_else(|| "generated key".to_string()),
        },
        None => DriverError::ConstraintViolation {
            store: schema.name.clone(),
            index: unique.join(","),
        },
    }
}

/// Classify a ConstraintError raised by an update. Puts replace by primary
/// key, so only unique indexes can reject them.
fn update_conflict(schema: &StoreSchema, message: String) -> DriverError {
    let unique = unique_index_names(schema);
    if unique.is_empty() {
        return IndexedDbError::Constraint(message).into();
    }
    DriverError::ConstraintViolation {
        store: schema.name.clone(),
        index: unique.join(","),
    }
}

#[async_trait(?Send)]
impl ObjectStoreDriver for IndexedDbDriver {
    async fn add_items(&self, store: &str, items: Vec<Value>) -> DriverResult<StatusToken> {
        let schema = self.schema(store)?;

        let mut keys: Vec<StoreKey> = Vec::with_capacity(items.len());
        for item in &items {
            if let Some(key) = record_key(schema, item)? {
                if keys.contains(&key) {
                    return Err(DriverError::AlreadyExists {
                        store: store.to_string(),
                        key: key.to_string(),
                    });
                }
                keys.push(key);
            }
        }

        let presence = self.key_presence(store, &keys).await?;
        if let Some((key, _)) = keys.iter().zip(&presence).find(|(_, present)| **present) {
            warn!("{} Rejected add to '{}': key {} exists", prefix::DB, store, key);
            return Err(DriverError::AlreadyExists {
                store: store.to_string(),
                key: key.to_string(),
            });
        }

        match self.write_all(store, &items, IdbObjectStore::add).await {
            Ok(()) => {}
            Err(IndexedDbError::Constraint(message)) => {
                warn!("{} Add to '{}' hit a constraint: {}", prefix::DB, store, message);
                let presence = self.key_presence(store, &keys).await?;
                let existing = keys
                    .iter()
                    .zip(&presence)
                    .find(|(_, present)| **present)
                    .map(|(key, _)| key);
                return Err(add_conflict(schema, existing, &keys));
            }
            Err(e) => return Err(e.into()),
        }

        debug!("{} add_items '{}': {} records", prefix::DB, store, items.len());
        Ok(StatusToken::new(store, Operation::Add, items.len()))
    }

    async fn update_items(&self, store: &str, items: Vec<Value>) -> DriverResult<StatusToken> {
        let schema = self.schema(store)?;

        let mut keys: Vec<StoreKey> = Vec::with_capacity(items.len());
        for item in &items {
            let key = record_key(schema, item)?.ok_or_else(|| {
                DriverError::InvalidKey(format!(
                    "update record has no key at path '{}'",
                    schema.key_path
                ))
            })?;
            keys.push(key);
        }

        let presence = self.key_presence(store, &keys).await?;
        if let Some((key, _)) = keys.iter().zip(&presence).find(|(_, present)| !**present) {
            warn!("{} Rejected update to '{}': key {} missing", prefix::DB, store, key);
            return Err(DriverError::NotFound {
                store: store.to_string(),
                key: key.to_string(),
            });
        }

        match self.write_all(store, &items, IdbObjectStore::put).await {
            Ok(()) => {}
            Err(IndexedDbError::Constraint(message)) => {
                warn!("{} Update to '{}' hit a constraint: {}", prefix::DB, store, message);
                return Err(update_conflict(schema, message));
            }
            Err(e) => return Err(e.into()),
        }

        debug!("{} update_items '{}': {} records", prefix::DB, store, items.len());
        Ok(StatusToken::new(store, Operation::Update, items.len()))
    }

    async fn get_by_key(&self, store: &str, key: &StoreKey) -> DriverResult<Option<Value>> {
        let (_tx, object_store, done) = self.begin(store, IdbTransactionMode::Readonly)?;
        let req = object_store
            .get(&key_to_js(key))
            .map_err(request_error("get"))?;

        let result = idb::settle_request(idb::request_future(&req)).await?;
        idb::settle_transaction(done).await?;

        if result.is_undefined() || result.is_null() {
            return Ok(None);
        }
        Ok(Some(js_to_record(&result)?))
    }

    async fn delete_by_key(&self, store: &str, key: &StoreKey) -> DriverResult<StatusToken> {
        let (_tx, object_store, done) = self.begin(store, IdbTransactionMode::Readwrite)?;
        let js_key = key_to_js(key);

        // Requests run in order, so the count sees the record before the delete
        let count_req = object_store
            .count_with_key(&js_key)
            .map_err(request_error("count"))?;
        let count = idb::request_future(&count_req);
        let delete_req = object_store
            .delete(&js_key)
            .map_err(request_error("delete"))?;
        let deleted = idb::request_future(&delete_req);

        let count = idb::settle_request(count).await?;
        idb::settle_request(deleted).await?;
        idb::settle_transaction(done).await?;

        Ok(StatusToken::new(
            store,
            Operation::Delete,
            count.as_f64().unwrap_or(0.0) as usize,
        ))
    }

    async fn get_all(&self, store: &str) -> DriverResult<Vec<Value>> {
        let (_tx, object_store, done) = self.begin(store, IdbTransactionMode::Readonly)?;
        let req = object_store.get_all().map_err(request_error("getAll"))?;

        let result = idb::settle_request(idb::request_future(&req)).await?;
        idb::settle_transaction(done).await?;
        Ok(js_to_records(&result)?)
    }

    async fn get_range(&self, store: &str, range: &KeyRange) -> DriverResult<Vec<Value>> {
        let key_range = range_to_js(range)?;
        let (_tx, object_store, done) = self.begin(store, IdbTransactionMode::Readonly)?;
        let req = object_store
            .get_all_with_key(&key_range)
            .map_err(request_error("getAll"))?;

        let result = idb::settle_request(idb::request_future(&req)).await?;
        idb::settle_transaction(done).await?;
        Ok(js_to_records(&result)?)
    }

    async fn get_by_index(
        &self,
        store: &str,
        index: &str,
        lower: &StoreKey,
        upper: &StoreKey,
        is_range: bool,
    ) -> DriverResult<Vec<Value>> {
        let key_range = range_to_js(&index_range(lower, upper, is_range)?)?;
        let (_tx, object_store, done) = self.begin(store, IdbTransactionMode::Readonly)?;
        let req = self
            .index(&object_store, store, index)?
            .get_all_with_key(&key_range)
            .map_err(request_error("index getAll"))?;

        let result = idb::settle_request(idb::request_future(&req)).await?;
        idb::settle_transaction(done).await?;
        Ok(js_to_records(&result)?)
    }

    async fn get_max_key(&self, store: &str) -> DriverResult<Option<StoreKey>> {
        self.extreme_key(store, None, IdbCursorDirection::Prev).await
    }

    async fn get_min_key(&self, store: &str) -> DriverResult<Option<StoreKey>> {
        self.extreme_key(store, None, IdbCursorDirection::Next).await
    }

    async fn get_max_index(&self, store: &str, index: &str) -> DriverResult<Option<StoreKey>> {
        self.extreme_key(store, Some(index), IdbCursorDirection::Prev)
            .await
    }

    async fn get_min_index(&self, store: &str, index: &str) -> DriverResult<Option<StoreKey>> {
        self.extreme_key(store, Some(index), IdbCursorDirection::Next)
            .await
    }

    async fn delete_all(&self, store: &str) -> DriverResult<StatusToken> {
        let (_tx, object_store, done) = self.begin(store, IdbTransactionMode::Readwrite)?;
        let count_req = object_store.count().map_err(request_error("count"))?;
        let count = idb::request_future(&count_req);
        let clear_req = object_store.clear().map_err(request_error("clear"))?;
        let cleared = idb::request_future(&clear_req);

        let count = idb::settle_request(count).await?;
        idb::settle_request(cleared).await?;
        idb::settle_transaction(done).await?;

        let affected = count.as_f64().unwrap_or(0.0) as usize;
        debug!("{} delete_all '{}': {} records", prefix::DB, store, affected);
        Ok(StatusToken::new(store, Operation::Clear, affected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objstore_core::IndexSchema;

    fn plain_store() -> StoreSchema {
        StoreSchema::new("Order", "id").index(IndexSchema::new("total", "total"))
    }

    fn unique_store() -> StoreSchema {
        plain_store()
            .index(IndexSchema::new("ref", "ref").unique(true))
            .index(IndexSchema::new("sku", "sku").unique(true))
    }

    #[test]
    fn test_add_conflict_on_taken_key() {
        let key = StoreKey::from(3);
        let err = add_conflict(&unique_store(), Some(&key), &[key.clone()]);
        assert_eq!(
            err,
            DriverError::AlreadyExists {
                store: "Order".into(),
                key: "3".into(),
            }
        );
    }

    #[test]
    fn test_add_conflict_without_unique_indexes() {
        let err = add_conflict(&plain_store(), None, &[StoreKey::from(7)]);
        assert_eq!(
            err,
            DriverError::AlreadyExists {
                store: "Order".into(),
                key: "7".into(),
            }
        );
    }

    #[test]
    fn test_add_conflict_names_unique_indexes() {
        let err = add_conflict(&unique_store(), None, &[StoreKey::from(7)]);
        assert_eq!(
            err,
            DriverError::ConstraintViolation {
                store: "Order".into(),
                index: "ref,sku".into(),
            }
        );
    }

    #[test]
    fn test_update_conflict_never_names_empty_index() {
        let err = update_conflict(&plain_store(), "ConstraintError: boom".into());
        assert!(matches!(err, DriverError::Backend(_)));

        let err = update_conflict(&unique_store(), "ConstraintError: boom".into());
        assert!(matches!(err, DriverError::ConstraintViolation { .. }));
    }
}
