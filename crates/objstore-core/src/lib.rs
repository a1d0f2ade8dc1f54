//! objstore core
//!
//! A typed repository facade over keyed object stores, following the
//! IndexedDB data model: named stores keyed by a primary key path, secondary
//! indexes, inclusive key ranges, and extremal key lookups.
//!
//! The crate is split along one seam:
//!
//! - [`ObjectStoreDriver`] - primitive store operations on JSON records and
//!   [`StoreKey`]s. Implemented by [`MemoryDriver`] here and by the
//!   IndexedDB driver in `objstore-indexeddb`.
//! - [`Repository`] - typed CRUD, range and index queries for one store,
//!   delegating every call to the driver.
//!
//! # Features
//!
//! - `subscriber` (default) - `tracing::init` helpers using tracing-subscriber
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use objstore_core::{DatabaseModel, Entity, IndexSchema, MemoryDriver, Repository, StoreSchema};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Order {
//!     id: u32,
//!     total: u32,
//! }
//!
//! impl Entity for Order {
//!     const STORE_NAME: &'static str = "Order";
//! }
//!
//! # tokio_test_block_on(async {
//! let model = DatabaseModel::new("shop")
//!     .store(StoreSchema::new("Order", "id").index(IndexSchema::new("total", "total")));
//! let driver = Arc::new(MemoryDriver::open(model)?);
//! let orders: Repository<Order, u32, _> = Repository::new(driver);
//!
//! orders.add(&[Order { id: 1, total: 10 }, Order { id: 2, total: 5 }]).await?;
//!
//! assert_eq!(orders.get_min_key().await?, Some(1));
//! assert_eq!(orders.get_max_index::<u32>("Total").await?, Some(10));
//! # Ok::<(), objstore_core::DriverError>(())
//! # }).unwrap();
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod driver;
pub mod error;
pub mod key;
pub mod memory;
pub mod naming;
pub mod repository;
pub mod schema;
pub mod status;
pub mod tracing;

// Re-export main types at crate root
pub use driver::ObjectStoreDriver;
pub use error::{DriverError, DriverResult};
pub use key::{KeyRange, StoreKey};
pub use memory::MemoryDriver;
pub use naming::to_camel_case;
pub use repository::{Entity, Repository};
pub use schema::{DatabaseModel, IndexSchema, StoreSchema};
pub use status::{Operation, StatusToken};
