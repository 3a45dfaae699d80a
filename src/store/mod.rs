//! Observable, cached, uniquely-keyed collections for dashboard widgets.
//!
//! Stores compose by wrapping one another behind the [`Collection`] trait:
//!
//! ```
//! use std::sync::Arc;
//! use mango_store::store::{
//!     AddOptions, CacheStore, Collection, IdentityStore, InMemoryTransport, Record,
//!     RemoteStore, RemoteStoreOptions,
//! };
//! use serde_json::json;
//!
//! # futures::executor::block_on(async {
//! let transport = Arc::new(InMemoryTransport::new());
//! let remote = RemoteStore::new(transport, RemoteStoreOptions::new("dataPoints"));
//! let points = IdentityStore::new(Arc::new(CacheStore::new(Arc::new(remote))));
//!
//! let record = Record::from_value(json!({"name": "Boiler temp"})).unwrap();
//! let id = points.add(record, AddOptions::default()).await.unwrap();
//! assert!(points.get(&id).await.unwrap().is_some());
//! # });
//! ```

mod cache;
mod collection;
mod constants;
pub mod error;
mod identity;
mod memory;
pub mod model;
mod observer;
mod predicate;
mod query;
pub mod remote;

pub use cache::CacheStore;
pub use collection::{AddOptions, Collection};
pub use constants::DEFAULT_ID_PROPERTY;
pub use error::{StoreError, StoreErrorCode, StoreResult};
pub use identity::IdentityStore;
pub use memory::MemoryStore;
pub use model::{Identity, Record};
pub use observer::{CollectionObserver, ListenerRegistration, ObserverRegistry};
pub use predicate::ArrayTester;
pub use query::{FieldMatcher, Query, QueryResults, SortDirection, SortField, ValueTester};
pub use remote::{
    HttpTransport, HttpTransportSettings, InMemoryTransport, RemoteOperation, RemoteRequest,
    RemoteStore, RemoteStoreOptions, RemoteTransport,
};
