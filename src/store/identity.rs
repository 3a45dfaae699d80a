use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::store::collection::{AddOptions, Collection};
use crate::store::constants::DEFAULT_ID_PROPERTY;
use crate::store::error::{internal_error, StoreResult};
use crate::store::model::{Identity, Record};
use crate::store::observer::{CollectionObserver, ListenerRegistration};
use crate::store::query::{Query, QueryResults};

/// Decorator that hands out surrogate keys to records inserted without one.
///
/// Keys come from a per-instance counter that only moves forward: removing a record never
/// frees its key. Assignment only happens when the wrapped collection is keyed on
/// [`DEFAULT_ID_PROPERTY`]; any other identity field is left to the wrapped collection.
pub struct IdentityStore {
    inner: Arc<dyn Collection>,
    counter: AtomicI64,
    auto_assign: bool,
}

impl IdentityStore {
    pub fn new(inner: Arc<dyn Collection>) -> Self {
        let auto_assign = inner.id_property() == DEFAULT_ID_PROPERTY;
        Self {
            inner,
            counter: AtomicI64::new(0),
            auto_assign,
        }
    }

    pub fn inner(&self) -> &Arc<dyn Collection> {
        &self.inner
    }

    pub fn assigns_identities(&self) -> bool {
        self.auto_assign
    }

    /// The identity the next keyless insert will receive.
    pub fn next_identity(&self) -> i64 {
        self.counter.load(Ordering::SeqCst)
    }

    // `i64::MAX` is never handed out, so the counter cannot wrap.
    fn assign(&self, record: &mut Record) -> StoreResult<Identity> {
        let next = self
            .counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_add(1)
            })
            .map_err(|_| internal_error("surrogate identity counter is exhausted"))?;
        let id = Identity::Number(next);
        record.set_identity(self.inner.id_property(), &id);
        log::debug!("assigned surrogate identity {id}");
        Ok(id)
    }

    // Caller-supplied numeric keys push the counter past them so generated keys never
    // collide with them later.
    fn observe(&self, id: &Identity) {
        if let Some(number) = id.as_number() {
            self.counter
                .fetch_max(number.saturating_add(1), Ordering::SeqCst);
        }
    }

    fn prepare_add(&self, mut record: Record, options: AddOptions) -> StoreResult<Record> {
        if self.auto_assign {
            match self.get_identity(&record) {
                Some(id) if !options.overwrite => self.observe(&id),
                _ => {
                    self.assign(&mut record)?;
                }
            }
        }
        Ok(record)
    }

    fn prepare_put(&self, mut record: Record) -> StoreResult<Record> {
        if self.auto_assign {
            match self.get_identity(&record) {
                Some(id) => self.observe(&id),
                None => {
                    self.assign(&mut record)?;
                }
            }
        }
        Ok(record)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Collection for IdentityStore {
    fn id_property(&self) -> &str {
        self.inner.id_property()
    }

    async fn get(&self, id: &Identity) -> StoreResult<Option<Record>> {
        self.inner.get(id).await
    }

    async fn add(&self, record: Record, options: AddOptions) -> StoreResult<Identity> {
        let record = self.prepare_add(record, options)?;
        self.inner.add(record, options).await
    }

    async fn put(&self, record: Record) -> StoreResult<Identity> {
        let record = self.prepare_put(record)?;
        self.inner.put(record).await
    }

    async fn add_confirmed(
        &self,
        record: Record,
        options: AddOptions,
    ) -> StoreResult<(Identity, Record)> {
        let record = self.prepare_add(record, options)?;
        self.inner.add_confirmed(record, options).await
    }

    async fn put_confirmed(&self, record: Record) -> StoreResult<(Identity, Record)> {
        let record = self.prepare_put(record)?;
        self.inner.put_confirmed(record).await
    }

    async fn remove(&self, id: &Identity) -> StoreResult<bool> {
        self.inner.remove(id).await
    }

    async fn query(&self, query: &Query) -> StoreResult<QueryResults> {
        self.inner.query(query).await
    }

    /// Reindexes `records` as `0..n` in input order, discarding any identities they
    /// carried, and continues the counter at `n`.
    async fn set_data(&self, mut records: Vec<Record>) -> StoreResult<()> {
        if !self.auto_assign {
            return self.inner.set_data(records).await;
        }
        let id_property = self.inner.id_property().to_string();
        for (index, record) in records.iter_mut().enumerate() {
            record.set_identity(&id_property, &Identity::Number(index as i64));
        }
        let loaded = records.len() as i64;
        self.inner.set_data(records).await?;
        self.counter.store(loaded, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self, observer: CollectionObserver) -> ListenerRegistration {
        self.inner.subscribe(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn identity_store() -> (IdentityStore, MemoryStore) {
        let memory = MemoryStore::new();
        (IdentityStore::new(Arc::new(memory.clone())), memory)
    }

    #[tokio::test]
    async fn assigns_increasing_identities() {
        let (store, _) = identity_store();
        let mut previous = None;
        for name in ["a", "b", "c", "d"] {
            let id = store
                .add(record(json!({"name": name})), AddOptions::default())
                .await
                .unwrap();
            let number = id.as_number().unwrap();
            if let Some(previous) = previous {
                assert!(number > previous);
            }
            previous = Some(number);
        }
        assert_eq!(previous, Some(3));
    }

    #[tokio::test]
    async fn identities_are_not_reused_after_remove() {
        let (store, _) = identity_store();
        let first = store
            .add(record(json!({"name": "a"})), AddOptions::default())
            .await
            .unwrap();
        store.remove(&first).await.unwrap();
        let second = store
            .add(record(json!({"name": "b"})), AddOptions::default())
            .await
            .unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn keeps_existing_identity_unless_overwrite() {
        let (store, memory) = identity_store();
        let id = store
            .add(record(json!({"id": "boiler", "name": "a"})), AddOptions::default())
            .await
            .unwrap();
        assert_eq!(id, Identity::from("boiler"));

        let reassigned = store
            .add(record(json!({"id": "boiler", "name": "b"})), AddOptions::overwrite())
            .await
            .unwrap();
        assert_eq!(reassigned, Identity::Number(0));
        assert_eq!(memory.len(), 2);
    }

    #[tokio::test]
    async fn explicit_numeric_identity_advances_counter() {
        let (store, _) = identity_store();
        store
            .add(record(json!({"id": 10})), AddOptions::default())
            .await
            .unwrap();
        let next = store
            .add(record(json!({"name": "x"})), AddOptions::default())
            .await
            .unwrap();
        assert_eq!(next, Identity::Number(11));
    }

    #[tokio::test]
    async fn exhausted_counter_fails_instead_of_wrapping() {
        let (store, memory) = identity_store();
        store
            .add(record(json!({"id": i64::MAX})), AddOptions::default())
            .await
            .unwrap();

        let err = store
            .add(record(json!({"name": "next"})), AddOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "store/internal");
        assert_eq!(store.next_identity(), i64::MAX);
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn set_data_reindexes_and_resets_counter() {
        let (store, memory) = identity_store();
        for _ in 0..5 {
            store
                .add(record(json!({"name": "before"})), AddOptions::default())
                .await
                .unwrap();
        }

        store
            .set_data(vec![
                record(json!({"id": "x", "name": "r0"})),
                record(json!({"name": "r1"})),
                record(json!({"id": 40, "name": "r2"})),
            ])
            .await
            .unwrap();

        for index in 0..3 {
            let loaded = memory.get_local(&Identity::Number(index)).unwrap();
            assert_eq!(loaded.get("name"), Some(&json!(format!("r{index}"))));
        }
        assert_eq!(memory.len(), 3);

        let next = store
            .add(record(json!({"name": "after"})), AddOptions::default())
            .await
            .unwrap();
        assert_eq!(next, Identity::Number(3));
    }

    #[tokio::test]
    async fn custom_identity_field_disables_assignment() {
        let memory = MemoryStore::with_id_property("xid");
        let store = IdentityStore::new(Arc::new(memory.clone()));
        assert!(!store.assigns_identities());

        let err = store
            .add(record(json!({"name": "x"})), AddOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "store/invalid-argument");

        store
            .set_data(vec![record(json!({"xid": "DP_1"}))])
            .await
            .unwrap();
        assert!(memory.contains(&Identity::from("DP_1")));
        assert_eq!(store.next_identity(), 0);
    }
}
