//! # vantage-store
//!
//! The global filter store and the two representations kept in step with
//! it: durable client storage and the page URL.
//!
//! ```
//! use std::sync::Arc;
//! use vantage_store::{bootstrap, Location, MemoryLocation, MemoryStorage};
//!
//! let location = Arc::new(MemoryLocation::new("http://localhost/mentions"));
//! let store = bootstrap(Arc::new(MemoryStorage::new()), location.clone());
//!
//! store.set_model("GPT-4o");
//! assert_eq!(location.href(), "http://localhost/mentions?range=7d&model=GPT-4o");
//! ```

pub mod bootstrap;
pub mod location;
pub mod storage;
pub mod store;

pub use bootstrap::{bootstrap, initial_configuration};
pub use location::{Location, MemoryLocation, UrlAdapter};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageAdapter, UnavailableStorage};
pub use store::{FilterStore, SyncTarget};
