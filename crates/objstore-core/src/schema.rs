//! Database model: the stores and indexes a driver is opened with.
//!
//! A `DatabaseModel` is plain configuration. It can be built in code or
//! loaded from JSON:
//!
//! ```rust
//! use objstore_core::schema::DatabaseModel;
//!
//! let model = DatabaseModel::from_json(r#"{
//!     "name": "shop",
//!     "stores": [
//!         { "name": "Order", "keyPath": "id",
//!           "indexes": [{ "name": "total", "keyPath": "total" }] }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(model.version, 1);
//! assert!(model.find_store("Order").unwrap().find_index("total").is_some());
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DriverError, DriverResult};

fn default_version() -> u32 {
    1
}

/// A database and the object stores it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseModel {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub stores: Vec<StoreSchema>,
}

impl DatabaseModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            stores: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn store(mut self, store: StoreSchema) -> Self {
        self.stores.push(store);
        self
    }

    /// Parse a model from JSON and validate it.
    pub fn from_json(json: &str) -> DriverResult<Self> {
        let model: DatabaseModel = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    /// Look up a store by name.
    pub fn find_store(&self, name: &str) -> Option<&StoreSchema> {
        self.stores.iter().find(|s| s.name == name)
    }

    /// Check names are present and unique.
    pub fn validate(&self) -> DriverResult<()> {
        if self.name.is_empty() {
            return Err(DriverError::Schema("database name is empty".into()));
        }
        if self.version == 0 {
            return Err(DriverError::Schema("database version must be >= 1".into()));
        }

        let mut store_names = HashSet::new();
        for store in &self.stores {
            if store.name.is_empty() {
                return Err(DriverError::Schema("store name is empty".into()));
            }
            if !store_names.insert(store.name.as_str()) {
                return Err(DriverError::Schema(format!(
                    "duplicate store '{}'",
                    store.name
                )));
            }
            store.validate()?;
        }
        Ok(())
    }
}

/// One object store: its primary key path and secondary indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSchema {
    pub name: String,
    pub key_path: String,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub indexes: Vec<IndexSchema>,
}

impl StoreSchema {
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            auto_increment: false,
            indexes: Vec::new(),
        }
    }

    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    pub fn index(mut self, index: IndexSchema) -> Self {
        self.indexes.push(index);
        self
    }

    /// Look up an index by name.
    pub fn find_index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|i| i.name == name)
    }

    fn validate(&self) -> DriverResult<()> {
        if self.key_path.is_empty() {
            return Err(DriverError::Schema(format!(
                "store '{}' has an empty key path",
                self.name
            )));
        }

        let mut index_names = HashSet::new();
        for index in &self.indexes {
            if index.name.is_empty() || index.key_path.is_empty() {
                return Err(DriverError::Schema(format!(
                    "store '{}' has an index with an empty name or key path",
                    self.name
                )));
            }
            if !index_names.insert(index.name.as_str()) {
                return Err(DriverError::Schema(format!(
                    "duplicate index '{}' on store '{}'",
                    index.name, self.name
                )));
            }
        }
        Ok(())
    }
}

/// A secondary index over one key path of a store's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSchema {
    pub name: String,
    pub key_path: String,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub multi_entry: bool,
}

impl IndexSchema {
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            unique: false,
            multi_entry: false,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn multi_entry(mut self, multi_entry: bool) -> Self {
        self.multi_entry = multi_entry;
        self
    }
}

/// Resolve a dotted key path (`"customer.id"`) against a record.
///
/// Returns `None` if any segment is missing or crosses a non-object value.
pub fn extract_key_path<'a>(record: &'a Value, key_path: &str) -> Option<&'a Value> {
    key_path
        .split('.')
        .try_fold(record, |value, segment| value.as_object()?.get(segment))
}

/// Write `value` at a dotted key path, creating intermediate objects.
///
/// Fails if the record (or an intermediate segment) is not an object.
pub fn inject_key_path(record: &mut Value, key_path: &str, value: Value) -> DriverResult<()> {
    let mut segments = key_path.split('.').peekable();
    let mut current = record;
    while let Some(segment) = segments.next() {
        let obj = current.as_object_mut().ok_or_else(|| {
            DriverError::InvalidKey(format!("cannot set key path '{}' on a non-object", key_path))
        })?;
        if segments.peek().is_none() {
            obj.insert(segment.to_string(), value);
            return Ok(());
        }
        current = obj
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
    Ok(())
}
