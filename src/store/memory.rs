use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::store::collection::{AddOptions, Collection};
use crate::store::constants::DEFAULT_ID_PROPERTY;
use crate::store::error::{duplicate_identity, invalid_argument, StoreResult};
use crate::store::model::{Identity, Record};
use crate::store::observer::{CollectionObserver, ListenerRegistration, ObserverRegistry};
use crate::store::query::{Query, QueryResults};

/// Synchronous in-process collection.
///
/// Used as the local mirror of a [`CacheStore`](crate::store::CacheStore) and as a
/// standalone store for page-local data. Records keep their insertion position, also
/// when they are overwritten, so sorted queries break ties by insertion order.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
    observers: ObserverRegistry,
}

struct MemoryInner {
    id_property: String,
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_position: u64,
    records: BTreeMap<u64, Record>,
    positions: HashMap<Identity, u64>,
}

impl MemoryState {
    fn clear(&mut self) {
        self.records.clear();
        self.positions.clear();
    }

    fn insert(&mut self, id: Identity, record: Record) -> bool {
        match self.positions.get(&id) {
            Some(position) => {
                self.records.insert(*position, record);
                true
            }
            None => {
                let position = self.next_position;
                self.next_position += 1;
                self.positions.insert(id, position);
                self.records.insert(position, record);
                false
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_id_property(DEFAULT_ID_PROPERTY)
    }

    pub fn with_id_property(id_property: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                id_property: id_property.into(),
                state: Mutex::new(MemoryState::default()),
            }),
            observers: ObserverRegistry::new(),
        }
    }

    /// Builds a store pre-filled with `records`, which must all carry an identity.
    pub fn with_records(records: Vec<Record>) -> StoreResult<Self> {
        let store = Self::new();
        store.replace_local(records)?;
        Ok(store)
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn require_identity(&self, record: &Record) -> StoreResult<Identity> {
        record.identity(&self.inner.id_property).ok_or_else(|| {
            invalid_argument(format!(
                "Record is missing its `{}` identity field",
                self.inner.id_property
            ))
        })
    }

    pub fn get_local(&self, id: &Identity) -> Option<Record> {
        let state = self.state();
        state
            .positions
            .get(id)
            .and_then(|position| state.records.get(position))
            .cloned()
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.state().positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().records.is_empty()
    }

    /// All records in insertion order.
    pub fn records(&self) -> Vec<Record> {
        self.state().records.values().cloned().collect()
    }

    pub fn query_local(&self, query: &Query) -> QueryResults {
        query.apply(self.records())
    }

    pub fn add_local(&self, record: Record, options: AddOptions) -> StoreResult<Identity> {
        let id = self.require_identity(&record)?;
        let replaced = {
            let mut state = self.state();
            if !options.overwrite && state.positions.contains_key(&id) {
                return Err(duplicate_identity(format!(
                    "A record with identity `{id}` already exists"
                )));
            }
            state.insert(id.clone(), record.clone())
        };
        if replaced {
            self.observers.notify_updated(&record);
        } else {
            self.observers.notify_added(&record);
        }
        Ok(id)
    }

    pub fn remove_local(&self, id: &Identity) -> bool {
        let removed = {
            let mut state = self.state();
            match state.positions.remove(id) {
                Some(position) => state.records.remove(&position).is_some(),
                None => false,
            }
        };
        if removed {
            self.observers.notify_removed(id);
        }
        removed
    }

    /// Replaces every record. Observers are not notified of bulk loads.
    pub fn replace_local(&self, records: Vec<Record>) -> StoreResult<()> {
        let mut keyed = Vec::with_capacity(records.len());
        for record in records {
            keyed.push((self.require_identity(&record)?, record));
        }
        let mut state = self.state();
        state.clear();
        for (id, record) in keyed {
            state.insert(id, record);
        }
        log::debug!("memory store reloaded with {} records", state.records.len());
        Ok(())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Collection for MemoryStore {
    fn id_property(&self) -> &str {
        &self.inner.id_property
    }

    async fn get(&self, id: &Identity) -> StoreResult<Option<Record>> {
        Ok(self.get_local(id))
    }

    async fn add(&self, record: Record, options: AddOptions) -> StoreResult<Identity> {
        self.add_local(record, options)
    }

    async fn put(&self, record: Record) -> StoreResult<Identity> {
        self.add_local(record, AddOptions::overwrite())
    }

    async fn remove(&self, id: &Identity) -> StoreResult<bool> {
        Ok(self.remove_local(id))
    }

    async fn query(&self, query: &Query) -> StoreResult<QueryResults> {
        Ok(self.query_local(query))
    }

    async fn set_data(&self, records: Vec<Record>) -> StoreResult<()> {
        self.replace_local(records)
    }

    fn subscribe(&self, observer: CollectionObserver) -> ListenerRegistration {
        self.observers.register(observer)
    }
}
