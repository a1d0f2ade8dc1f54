//! In-memory object store driver
//!
//! A BTreeMap-based implementation of [`ObjectStoreDriver`] for testing and
//! development. Not suitable for production use due to lack of persistence.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::driver::{index_range, ObjectStoreDriver};
use crate::error::{DriverError, DriverResult};
use crate::key::{KeyRange, StoreKey};
use crate::schema::{extract_key_path, inject_key_path, DatabaseModel, IndexSchema, StoreSchema};
use crate::status::{Operation, StatusToken};
use crate::tracing::prefix;

/// In-memory object store driver.
///
/// Holds one ordered table per store declared in the [`DatabaseModel`].
/// Useful for:
/// - Unit testing repositories
/// - Development/prototyping off the browser
///
/// Each call runs under one short lock, so a single call (including a
/// multi-record add or update) is all-or-nothing. Nothing spans two calls.
#[derive(Debug)]
pub struct MemoryDriver {
    name: String,
    tables: RwLock<HashMap<String, Table>>,
}

/// Largest key an auto-increment store generates (2^53).
const MAX_GENERATED_KEY: i64 = 1 << 53;

#[derive(Debug)]
struct Table {
    schema: StoreSchema,
    records: BTreeMap<StoreKey, Value>,
    next_key: i64,
}

impl MemoryDriver {
    /// Create a driver holding every store the model declares.
    pub fn open(model: DatabaseModel) -> DriverResult<Self> {
        model.validate()?;

        let tables = model
            .stores
            .into_iter()
            .map(|schema| {
                let table = Table {
                    schema,
                    records: BTreeMap::new(),
                    next_key: 1,
                };
                (table.schema.name.clone(), table)
            })
            .collect::<HashMap<_, _>>();

        info!(
            "{} Opened in-memory database '{}' ({} stores)",
            prefix::DB_OPEN,
            model.name,
            tables.len()
        );

        Ok(Self {
            name: model.name,
            tables: RwLock::new(tables),
        })
    }

    /// Database name from the model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of records in a store.
    pub fn count(&self, store: &str) -> DriverResult<usize> {
        let tables = self.tables.read();
        Ok(table(&tables, store)?.records.len())
    }
}

fn table<'a>(tables: &'a HashMap<String, Table>, store: &str) -> DriverResult<&'a Table> {
    tables
        .get(store)
        .ok_or_else(|| DriverError::StoreNotFound(store.to_string()))
}

fn table_mut<'a>(
    tables: &'a mut HashMap<String, Table>,
    store: &str,
) -> DriverResult<&'a mut Table> {
    tables
        .get_mut(store)
        .ok_or_else(|| DriverError::StoreNotFound(store.to_string()))
}

/// Keys a record contributes to an index.
///
/// Records without a valid key at the index key path are not indexed.
/// Multi-entry indexes contribute each distinct valid array element.
fn index_keys(index: &IndexSchema, record: &Value) -> Vec<StoreKey> {
    let Some(value) = extract_key_path(record, &index.key_path) else {
        return Vec::new();
    };

    match value {
        Value::Array(items) if index.multi_entry => {
            let keys: BTreeSet<StoreKey> = items
                .iter()
                .filter_map(|item| StoreKey::from_json(item).ok())
                .collect();
            keys.into_iter().collect()
        }
        _ => StoreKey::from_json(value).into_iter().collect(),
    }
}

impl Table {
    fn index(&self, name: &str) -> DriverResult<&IndexSchema> {
        self.schema
            .find_index(name)
            .ok_or_else(|| DriverError::IndexNotFound {
                store: self.schema.name.clone(),
                index: name.to_string(),
            })
    }

    fn primary_key(&self, record: &Value) -> DriverResult<StoreKey> {
        let value = extract_key_path(record, &self.schema.key_path).ok_or_else(|| {
            DriverError::InvalidKey(format!(
                "record has no key at path '{}' in store '{}'",
                self.schema.key_path, self.schema.name
            ))
        })?;
        StoreKey::from_json(value)
    }

    /// Reject staged records that collide on a unique index with each other
    /// or with stored records they do not replace.
    fn check_unique(&self, staged: &BTreeMap<StoreKey, Value>) -> DriverResult<()> {
        for index in self.schema.indexes.iter().filter(|i| i.unique) {
            let mut seen: BTreeSet<StoreKey> = self
                .records
                .iter()
                .filter(|(key, _)| !staged.contains_key(*key))
                .flat_map(|(_, record)| index_keys(index, record))
                .collect();

            for record in staged.values() {
                for key in index_keys(index, record) {
                    if !seen.insert(key) {
                        return Err(DriverError::ConstraintViolation {
                            store: self.schema.name.clone(),
                            index: index.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Entries of an index inside `range`, ordered by index key then primary key.
    fn scan_index(&self, index: &IndexSchema, range: &KeyRange) -> Vec<&Value> {
        let mut entries: Vec<(StoreKey, &StoreKey, &Value)> = Vec::new();
        for (primary, record) in &self.records {
            for key in index_keys(index, record) {
                if range.contains(&key) {
                    entries.push((key, primary, record));
                }
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        entries.into_iter().map(|(_, _, record)| record).collect()
    }

    fn index_extreme(&self, index: &IndexSchema, max: bool) -> Option<StoreKey> {
        let keys = self
            .records
            .values()
            .flat_map(|record| index_keys(index, record));
        if max {
            keys.max()
        } else {
            keys.min()
        }
    }
}

#[async_trait(?Send)]
impl ObjectStoreDriver for MemoryDriver {
    async fn add_items(&self, store: &str, items: Vec<Value>) -> DriverResult<StatusToken> {
        let mut tables = self.tables.write();
        let table = table_mut(&mut tables, store)?;

        let mut staged: BTreeMap<StoreKey, Value> = BTreeMap::new();
        let mut next_key = table.next_key;

        for mut item in items {
            let key = match extract_key_path(&item, &table.schema.key_path) {
                Some(value) => StoreKey::from_json(value)?,
                None if table.schema.auto_increment => {
                    if next_key > MAX_GENERATED_KEY {
                        warn!("{} Key generator exhausted for '{}'", prefix::DB, store);
                        return Err(DriverError::InvalidKey(format!(
                            "key generator for store '{}' is exhausted",
                            store
                        )));
                    }
                    let generated = next_key;
                    inject_key_path(&mut item, &table.schema.key_path, Value::from(generated))?;
                    StoreKey::from(generated)
                }
                None => {
                    return Err(DriverError::InvalidKey(format!(
                        "record has no key at path '{}' in store '{}'",
                        table.schema.key_path, store
                    )))
                }
            };

            if table.records.contains_key(&key) || staged.contains_key(&key) {
                warn!("{} Rejected add to '{}': key {} exists", prefix::DB, store, key);
                return Err(DriverError::AlreadyExists {
                    store: store.to_string(),
                    key: key.to_string(),
                });
            }

            // Numeric keys push the generator past themselves
            if table.schema.auto_increment {
                if let StoreKey::Number(n) = key {
                    if n >= next_key as f64 {
                        next_key = if n >= MAX_GENERATED_KEY as f64 {
                            MAX_GENERATED_KEY + 1
                        } else {
                            n.floor() as i64 + 1
                        };
                    }
                }
            }

            staged.insert(key, item);
        }

        table.check_unique(&staged)?;

        let affected = staged.len();
        table.next_key = next_key;
        table.records.extend(staged);

        debug!("{} add_items '{}': {} records", prefix::DB, store, affected);
        Ok(StatusToken::new(store, Operation::Add, affected))
    }

    async fn update_items(&self, store: &str, items: Vec<Value>) -> DriverResult<StatusToken> {
        let mut tables = self.tables.write();
        let table = table_mut(&mut tables, store)?;

        let mut staged: BTreeMap<StoreKey, Value> = BTreeMap::new();
        for item in items {
            let key = table.primary_key(&item)?;
            if !table.records.contains_key(&key) {
                warn!("{} Rejected update to '{}': key {} missing", prefix::DB, store, key);
                return Err(DriverError::NotFound {
                    store: store.to_string(),
                    key: key.to_string(),
                });
            }
            // Later items with the same key win, as with repeated puts
            staged.insert(key, item);
        }

        table.check_unique(&staged)?;

        let affected = staged.len();
        table.records.extend(staged);

        debug!("{} update_items '{}': {} records", prefix::DB, store, affected);
        Ok(StatusToken::new(store, Operation::Update, affected))
    }

    async fn get_by_key(&self, store: &str, key: &StoreKey) -> DriverResult<Option<Value>> {
        let tables = self.tables.read();
        Ok(table(&tables, store)?.records.get(key).cloned())
    }

    async fn delete_by_key(&self, store: &str, key: &StoreKey) -> DriverResult<StatusToken> {
        let mut tables = self.tables.write();
        let removed = table_mut(&mut tables, store)?.records.remove(key);
        Ok(StatusToken::new(
            store,
            Operation::Delete,
            usize::from(removed.is_some()),
        ))
    }

    async fn get_all(&self, store: &str) -> DriverResult<Vec<Value>> {
        let tables = self.tables.read();
        Ok(table(&tables, store)?.records.values().cloned().collect())
    }

    async fn get_range(&self, store: &str, range: &KeyRange) -> DriverResult<Vec<Value>> {
        let tables = self.tables.read();
        Ok(table(&tables, store)?
            .records
            .range(range.lower()..=range.upper())
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn get_by_index(
        &self,
        store: &str,
        index: &str,
        lower: &StoreKey,
        upper: &StoreKey,
        is_range: bool,
    ) -> DriverResult<Vec<Value>> {
        let range = index_range(lower, upper, is_range)?;
        let tables = self.tables.read();
        let table = table(&tables, store)?;
        let index = table.index(index)?;
        Ok(table
            .scan_index(index, &range)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn get_max_key(&self, store: &str) -> DriverResult<Option<StoreKey>> {
        let tables = self.tables.read();
        Ok(table(&tables, store)?.records.keys().next_back().cloned())
    }

    async fn get_min_key(&self, store: &str) -> DriverResult<Option<StoreKey>> {
        let tables = self.tables.read();
        Ok(table(&tables, store)?.records.keys().next().cloned())
    }

    async fn get_max_index(&self, store: &str, index: &str) -> DriverResult<Option<StoreKey>> {
        let tables = self.tables.read();
        let table = table(&tables, store)?;
        let index = table.index(index)?;
        Ok(table.index_extreme(index, true))
    }

    async fn get_min_index(&self, store: &str, index: &str) -> DriverResult<Option<StoreKey>> {
        let tables = self.tables.read();
        let table = table(&tables, store)?;
        let index = table.index(index)?;
        Ok(table.index_extreme(index, false))
    }

    async fn delete_all(&self, store: &str) -> DriverResult<StatusToken> {
        let mut tables = self.tables.write();
        let table = table_mut(&mut tables, store)?;
        let affected = table.records.len();
        table.records.clear();

        debug!("{} delete_all '{}': {} records", prefix::DB, store, affected);
        Ok(StatusToken::new(store, Operation::Clear, affected))
    }
}
