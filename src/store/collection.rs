use async_trait::async_trait;

use crate::store::error::{invalid_argument, StoreResult};
use crate::store::model::{Identity, Record};
use crate::store::observer::{CollectionObserver, ListenerRegistration};
use crate::store::query::{Query, QueryResults};

/// Per-call options for [`Collection::add`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Replace an existing record with the same identity instead of failing.
    pub overwrite: bool,
}

impl AddOptions {
    pub fn overwrite() -> Self {
        Self { overwrite: true }
    }
}

/// The contract shared by every store adapter.
///
/// Adapters compose by wrapping an `Arc<dyn Collection>`: the identity decorator, the
/// remote adapter and the cache layer all expose this same surface to widgets.
/// Absence is not an error: `get` yields `None` and `remove` yields `false`.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Collection: Send + Sync + 'static {
    /// Name of the record field holding the identity.
    fn id_property(&self) -> &str;

    fn get_identity(&self, record: &Record) -> Option<Identity> {
        record.identity(self.id_property())
    }

    async fn get(&self, id: &Identity) -> StoreResult<Option<Record>>;

    /// Inserts `record` and returns its identity. Fails with a duplicate-identity error when
    /// the identity is already present, unless `options.overwrite` is set.
    async fn add(&self, record: Record, options: AddOptions) -> StoreResult<Identity>;

    /// Inserts or replaces `record`.
    async fn put(&self, record: Record) -> StoreResult<Identity>;

    /// Like [`add`](Self::add), but also returns the record as the collection stored it.
    ///
    /// Collections that rewrite records on the way in override this. The default echoes
    /// `record` with the confirmed identity set.
    async fn add_confirmed(
        &self,
        mut record: Record,
        options: AddOptions,
    ) -> StoreResult<(Identity, Record)> {
        let id = self.add(record.clone(), options).await?;
        record.set_identity(self.id_property(), &id);
        Ok((id, record))
    }

    /// Like [`put`](Self::put), but also returns the record as the collection stored it.
    async fn put_confirmed(&self, mut record: Record) -> StoreResult<(Identity, Record)> {
        let id = self.put(record.clone()).await?;
        record.set_identity(self.id_property(), &id);
        Ok((id, record))
    }

    async fn remove(&self, id: &Identity) -> StoreResult<bool>;

    async fn query(&self, query: &Query) -> StoreResult<QueryResults>;

    /// Replaces the whole content of the collection.
    async fn set_data(&self, _records: Vec<Record>) -> StoreResult<()> {
        Err(invalid_argument(
            "This collection does not support replacing its data",
        ))
    }

    fn subscribe(&self, observer: CollectionObserver) -> ListenerRegistration;
}
