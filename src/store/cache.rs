use std::sync::Arc;

use async_trait::async_trait;

use crate::store::collection::{AddOptions, Collection};
use crate::store::error::StoreResult;
use crate::store::memory::MemoryStore;
use crate::store::model::{Identity, Record};
use crate::store::observer::{CollectionObserver, ListenerRegistration, ObserverRegistry};
use crate::store::query::{Query, QueryResults};

/// Cache-through composition of an authoritative `master` collection and a local
/// [`MemoryStore`] mirror.
///
/// Reads prefer the mirror. Writes go to the master first; the mirror is only touched, and
/// observers only notified, once the master confirms, and then with the record the master
/// stored rather than the one the caller sent. A failed write leaves the mirror as
/// it was and hands the error back. Operations are not serialized against each other:
/// when several writes are in flight the mirror is updated in the order the master
/// answers them.
pub struct CacheStore {
    master: Arc<dyn Collection>,
    caching: MemoryStore,
    observers: ObserverRegistry,
}

impl CacheStore {
    pub fn new(master: Arc<dyn Collection>) -> Self {
        let caching = MemoryStore::with_id_property(master.id_property());
        Self::with_cache(master, caching)
    }

    /// Uses `caching` as the mirror. Its identity field must match the master's.
    pub fn with_cache(master: Arc<dyn Collection>, caching: MemoryStore) -> Self {
        Self {
            master,
            caching,
            observers: ObserverRegistry::new(),
        }
    }

    pub fn master(&self) -> &Arc<dyn Collection> {
        &self.master
    }

    /// The local mirror, for reads that must not reach the master.
    pub fn caching(&self) -> &MemoryStore {
        &self.caching
    }

    /// Runs `query` against the mirror only.
    pub fn query_cached(&self, query: &Query) -> QueryResults {
        self.caching.query_local(query)
    }

    fn mirror(&self, record: Record) -> StoreResult<()> {
        self.caching.add_local(record, AddOptions::overwrite())?;
        Ok(())
    }

    // `record` is the master's confirmed copy, not the one the caller sent.
    fn confirmed_write(&self, id: &Identity, mut record: Record) -> StoreResult<Record> {
        let was_cached = self.caching.contains(id);
        record.set_identity(self.master.id_property(), id);
        self.mirror(record.clone())?;
        if was_cached {
            self.observers.notify_updated(&record);
        } else {
            self.observers.notify_added(&record);
        }
        Ok(record)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Collection for CacheStore {
    fn id_property(&self) -> &str {
        self.master.id_property()
    }

    async fn get(&self, id: &Identity) -> StoreResult<Option<Record>> {
        if let Some(record) = self.caching.get_local(id) {
            return Ok(Some(record));
        }
        let fetched = self.master.get(id).await?;
        if let Some(record) = &fetched {
            log::debug!("cache miss for {id} filled from master");
            self.mirror(record.clone())?;
        }
        Ok(fetched)
    }

    async fn add(&self, record: Record, options: AddOptions) -> StoreResult<Identity> {
        self.add_confirmed(record, options).await.map(|(id, _)| id)
    }

    async fn put(&self, record: Record) -> StoreResult<Identity> {
        self.put_confirmed(record).await.map(|(id, _)| id)
    }

    async fn add_confirmed(
        &self,
        record: Record,
        options: AddOptions,
    ) -> StoreResult<(Identity, Record)> {
        let (id, confirmed) = self.master.add_confirmed(record, options).await?;
        let stored = self.confirmed_write(&id, confirmed)?;
        Ok((id, stored))
    }

    async fn put_confirmed(&self, record: Record) -> StoreResult<(Identity, Record)> {
        let (id, confirmed) = self.master.put_confirmed(record).await?;
        let stored = self.confirmed_write(&id, confirmed)?;
        Ok((id, stored))
    }

    async fn remove(&self, id: &Identity) -> StoreResult<bool> {
        let removed = self.master.remove(id).await?;
        self.caching.remove_local(id);
        if removed {
            self.observers.notify_removed(id);
        }
        Ok(removed)
    }

    /// Queries go to the master because the mirror is never known to be complete; every
    /// returned record is written back into the mirror.
    async fn query(&self, query: &Query) -> StoreResult<QueryResults> {
        let results = self.master.query(query).await?;
        for record in &results {
            self.mirror(record.clone())?;
        }
        Ok(results)
    }

    fn subscribe(&self, observer: CollectionObserver) -> ListenerRegistration {
        self.observers.register(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::error::remote_operation;
    use crate::store::remote::{InMemoryTransport, RemoteStore, RemoteStoreOptions};
    use serde_json::json;
    use std::sync::Mutex;

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn cache_over(transport: &InMemoryTransport) -> CacheStore {
        let remote = RemoteStore::new(
            Arc::new(transport.clone()),
            RemoteStoreOptions::new("points"),
        );
        CacheStore::new(Arc::new(remote))
    }

    #[tokio::test]
    async fn cache_hit_does_not_reach_master() {
        let transport = InMemoryTransport::new();
        let cache = cache_over(&transport);
        cache
            .caching()
            .add_local(record(json!({"id": "A"})), AddOptions::default())
            .unwrap();

        assert!(cache.get(&Identity::from("A")).await.unwrap().is_some());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn put_notifies_update_for_cached_records() {
        let transport = InMemoryTransport::new();
        let cache = cache_over(&transport);
        let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let (added, updated) = (events.clone(), events.clone());
        let _registration = cache.subscribe(
            CollectionObserver::new()
                .with_add(move |_| added.lock().unwrap().push("add"))
                .with_update(move |_| updated.lock().unwrap().push("update")),
        );

        let id = cache.put(record(json!({"id": "A", "v": 1}))).await.unwrap();
        cache.put(record(json!({"id": "A", "v": 2}))).await.unwrap();

        assert_eq!(*events.lock().unwrap(), vec!["add", "update"]);
        assert_eq!(
            cache.caching().get_local(&id).unwrap().get("v"),
            Some(&json!(2))
        );
    }

    #[tokio::test]
    async fn failed_remove_keeps_cache() {
        let transport = InMemoryTransport::new();
        let cache = cache_over(&transport);
        let id = cache.put(record(json!({"id": "A"}))).await.unwrap();

        transport.fail_next(remote_operation("point is in use"));
        assert!(cache.remove(&id).await.is_err());
        assert!(cache.caching().contains(&id));

        assert!(cache.remove(&id).await.unwrap());
        assert!(!cache.caching().contains(&id));
    }

    #[tokio::test]
    async fn query_writes_results_back() {
        let transport = InMemoryTransport::new();
        transport
            .insert("points", record(json!({"id": 1, "zone": "a"})))
            .unwrap();
        transport
            .insert("points", record(json!({"id": 2, "zone": "b"})))
            .unwrap();
        let cache = cache_over(&transport);

        let results = cache
            .query(&Query::new().where_equals("zone", "a"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(cache.caching().contains(&Identity::from(1)));
        assert!(!cache.caching().contains(&Identity::from(2)));
        assert_eq!(cache.query_cached(&Query::new()).len(), 1);
    }

    fn normalizing_transport() -> InMemoryTransport {
        InMemoryTransport::new().with_normalizer(|record| {
            if let Some(name) = record.get("name").and_then(serde_json::Value::as_str) {
                let upper = name.to_uppercase();
                record.set("name", upper);
            }
            if let Some(id) = record.identity("id") {
                record.set("xid", format!("DP_{id}"));
            }
        })
    }

    #[tokio::test]
    async fn mirror_and_observers_see_the_confirmed_record() {
        let transport = normalizing_transport();
        let cache = cache_over(&transport);
        let seen: Arc<Mutex<Vec<(&'static str, serde_json::Value)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let (added, updated) = (seen.clone(), seen.clone());
        let _registration = cache.subscribe(
            CollectionObserver::new()
                .with_add(move |r| added.lock().unwrap().push(("add", r.clone().into_value())))
                .with_update(move |r| {
                    updated
                        .lock()
                        .unwrap()
                        .push(("update", r.clone().into_value()))
                }),
        );

        let id = cache
            .add(record(json!({"name": "fan"})), AddOptions::default())
            .await
            .unwrap();
        let created = json!({"id": 1, "name": "FAN", "xid": "DP_1"});
        assert_eq!(cache.caching().get_local(&id).unwrap().into_value(), created);

        cache
            .put(record(json!({"id": 1, "name": "pump"})))
            .await
            .unwrap();
        let updated = json!({"id": 1, "name": "PUMP", "xid": "DP_1"});
        assert_eq!(cache.caching().get_local(&id).unwrap().into_value(), updated);
        assert_eq!(transport.records("points")[0].clone().into_value(), updated);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("add", created), ("update", updated)]
        );
    }

    #[tokio::test]
    async fn add_over_stale_mirror_entry_notifies_update() {
        let transport = InMemoryTransport::new();
        let cache = cache_over(&transport);
        cache
            .caching()
            .add_local(record(json!({"id": "A", "v": 0})), AddOptions::default())
            .unwrap();
        let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let (added, updated) = (events.clone(), events.clone());
        let _registration = cache.subscribe(
            CollectionObserver::new()
                .with_add(move |_| added.lock().unwrap().push("add"))
                .with_update(move |_| updated.lock().unwrap().push("update")),
        );

        cache
            .add(record(json!({"id": "A", "v": 1})), AddOptions::default())
            .await
            .unwrap();

        assert_eq!(*events.lock().unwrap(), vec!["update"]);
        assert_eq!(
            cache.caching().get_local(&Identity::from("A")).unwrap().get("v"),
            Some(&json!(1))
        );
    }
}
