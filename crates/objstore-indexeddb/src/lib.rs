//! IndexedDB driver for objstore repositories (browser WASM)
//!
//! [`IndexedDbDriver`] implements `objstore_core::ObjectStoreDriver` on top of
//! the browser's IndexedDB, so the same `Repository<E, K>` code runs against
//! the in-memory driver in native tests and against IndexedDB in the browser.
//!
//! # Schema
//!
//! The database layout comes from a `DatabaseModel`. Opening the driver
//! upgrades the database to the model's version, creating any object stores
//! and indexes it does not have yet. Records are stored as plain JS objects
//! (converted through JSON), keyed by the store's key path.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use objstore_core::{DatabaseModel, Repository, StoreSchema, IndexSchema};
//! use objstore_indexeddb::IndexedDbDriver;
//!
//! let model = DatabaseModel::new("shop").store(
//!     StoreSchema::new("order", "id")
//!         .auto_increment(true)
//!         .index(IndexSchema::new("customer", "customer")),
//! );
//! let driver = Arc::new(IndexedDbDriver::open(model).await?);
//! let orders: Repository<Order, u32> = Repository::new(driver);
//!
//! orders.add_one(&order).await?;
//! let latest = orders.get_max_key().await?;
//! ```

pub mod convert;
pub mod driver;
pub mod error;
pub mod idb;

pub use driver::IndexedDbDriver;
pub use error::{IndexedDbError, Result};
