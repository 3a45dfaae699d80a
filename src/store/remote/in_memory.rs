use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::store::constants::DEFAULT_ID_PROPERTY;
use crate::store::error::{
    duplicate_identity, invalid_argument, remote_transport, StoreError, StoreResult,
};
use crate::store::model::{Identity, Record};

use super::{RemoteOperation, RemoteRequest, RemoteTransport};

/// In-process stand-in for the dashboard's remote store endpoints.
///
/// Behaves like the server side: it owns the records per store name, assigns identities
/// to records created without one, and can be told to always reassign identities, to
/// rewrite records as it stores them, to go offline, or to fail the next calls.
#[derive(Clone)]
pub struct InMemoryTransport {
    state: Arc<Mutex<TransportState>>,
}

type Normalizer = Arc<dyn Fn(&mut Record) + Send + Sync>;

struct TransportState {
    id_property: String,
    reassign_identities: bool,
    normalizer: Option<Normalizer>,
    next_server_id: i64,
    offline: bool,
    failures: VecDeque<StoreError>,
    calls: Vec<RemoteRequest>,
    stores: BTreeMap<String, Vec<Record>>,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TransportState {
                id_property: DEFAULT_ID_PROPERTY.to_string(),
                reassign_identities: false,
                normalizer: None,
                next_server_id: 1,
                offline: false,
                failures: VecDeque::new(),
                calls: Vec::new(),
                stores: BTreeMap::new(),
            })),
        }
    }

    pub fn with_id_property(self, id_property: impl Into<String>) -> Self {
        self.state().id_property = id_property.into();
        self
    }

    /// Makes `create` ignore client identities and always hand out server ones.
    pub fn with_reassigned_identities(self) -> Self {
        self.state().reassign_identities = true;
        self
    }

    /// Applies `normalize` to every created or updated record after its identity is set,
    /// so responses carry fields the client never sent.
    pub fn with_normalizer<F>(self, normalize: F) -> Self
    where
        F: Fn(&mut Record) + Send + Sync + 'static,
    {
        self.state().normalizer = Some(Arc::new(normalize));
        self
    }

    fn state(&self) -> MutexGuard<'_, TransportState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Queues `error` as the outcome of the next call.
    pub fn fail_next(&self, error: StoreError) {
        self.state().failures.push_back(error);
    }

    /// Seeds a record directly on the server side, bypassing the call log.
    pub fn insert(&self, store: &str, record: Record) -> StoreResult<Identity> {
        self.state().create(store, record, false)
    }

    pub fn records(&self, store: &str) -> Vec<Record> {
        self.state()
            .stores
            .get(store)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<RemoteRequest> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, operation: RemoteOperation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }
}

impl TransportState {
    fn table(&mut self, store: &str) -> &mut Vec<Record> {
        self.stores.entry(store.to_string()).or_default()
    }

    fn position(&mut self, store: &str, id: &Identity) -> Option<usize> {
        let id_property = self.id_property.clone();
        self.table(store)
            .iter()
            .position(|record| record.identity(&id_property).as_ref() == Some(id))
    }

    fn server_identity(&mut self) -> Identity {
        let id = Identity::Number(self.next_server_id);
        self.next_server_id += 1;
        id
    }

    fn normalize(&self, record: &mut Record) {
        if let Some(normalize) = &self.normalizer {
            normalize(record);
        }
    }

    fn create(
        &mut self,
        store: &str,
        mut record: Record,
        reassign: bool,
    ) -> StoreResult<Identity> {
        let id = match record.identity(&self.id_property) {
            Some(id) if !reassign => id,
            _ => self.server_identity(),
        };
        if self.position(store, &id).is_some() {
            return Err(duplicate_identity(format!(
                "{store}: identity `{id}` already exists"
            )));
        }
        let id_property = self.id_property.clone();
        record.set_identity(&id_property, &id);
        self.normalize(&mut record);
        self.table(store).push(record);
        Ok(id)
    }

    fn update(&mut self, store: &str, mut record: Record) -> Identity {
        let id = match record.identity(&self.id_property) {
            Some(id) => id,
            None => self.server_identity(),
        };
        let id_property = self.id_property.clone();
        record.set_identity(&id_property, &id);
        self.normalize(&mut record);
        match self.position(store, &id) {
            Some(index) => self.table(store)[index] = record,
            None => self.table(store).push(record),
        }
        id
    }

    fn handle(&mut self, request: &RemoteRequest) -> StoreResult<Value> {
        let store = request.store.as_str();
        match request.operation {
            RemoteOperation::Create => {
                let record = Record::from_value(request.payload.clone())?;
                let reassign = self.reassign_identities;
                let id = self.create(store, record, reassign)?;
                Ok(self.read(store, &id))
            }
            RemoteOperation::Update => {
                let record = Record::from_value(request.payload.clone())?;
                let id = self.update(store, record);
                Ok(self.read(store, &id))
            }
            RemoteOperation::Read => {
                let id = payload_identity(&request.payload)?;
                Ok(self.read(store, &id))
            }
            RemoteOperation::Delete => {
                let id = payload_identity(&request.payload)?;
                let removed = match self.position(store, &id) {
                    Some(index) => {
                        self.table(store).remove(index);
                        true
                    }
                    None => false,
                };
                Ok(Value::Bool(removed))
            }
            RemoteOperation::List => {
                let filter = request
                    .payload
                    .get("filter")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                let records = self
                    .table(store)
                    .iter()
                    .filter(|record| {
                        filter.iter().all(|(field, expected)| {
                            record.get(field).unwrap_or(&Value::Null) == expected
                        })
                    })
                    .cloned()
                    .map(Record::into_value)
                    .collect();
                Ok(Value::Array(records))
            }
        }
    }

    fn read(&mut self, store: &str, id: &Identity) -> Value {
        match self.position(store, id) {
            Some(index) => self.table(store)[index].clone().into_value(),
            None => Value::Null,
        }
    }
}

fn payload_identity(payload: &Value) -> StoreResult<Identity> {
    Identity::from_value(payload)
        .ok_or_else(|| invalid_argument(format!("`{payload}` is not a valid identity")))
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl RemoteTransport for InMemoryTransport {
    async fn call(&self, request: RemoteRequest) -> StoreResult<Value> {
        let mut state = self.state();
        state.calls.push(request.clone());
        if state.offline {
            return Err(remote_transport(format!(
                "{}.{}: transport is offline",
                request.store, request.operation
            )));
        }
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        state.handle(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(operation: RemoteOperation, payload: Value) -> RemoteRequest {
        RemoteRequest::new("points", operation, payload)
    }

    #[tokio::test]
    async fn create_assigns_missing_identities() {
        let transport = InMemoryTransport::new();
        let created = transport
            .call(request(RemoteOperation::Create, json!({"name": "fan"})))
            .await
            .unwrap();
        assert_eq!(created, json!({"name": "fan", "id": 1}));

        let read = transport
            .call(request(RemoteOperation::Read, json!(1)))
            .await
            .unwrap();
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn create_rejects_existing_identity() {
        let transport = InMemoryTransport::new();
        transport
            .insert("points", Record::from_value(json!({"id": "A"})).unwrap())
            .unwrap();
        let err = transport
            .call(request(RemoteOperation::Create, json!({"id": "A"})))
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "store/duplicate-identity");
    }

    #[tokio::test]
    async fn list_applies_equality_filter() {
        let transport = InMemoryTransport::new();
        for (id, zone) in [("a", "north"), ("b", "south"), ("c", "north")] {
            transport
                .insert(
                    "points",
                    Record::from_value(json!({"id": id, "zone": zone})).unwrap(),
                )
                .unwrap();
        }
        let listed = transport
            .call(request(
                RemoteOperation::List,
                json!({"filter": {"zone": "north"}, "sort": []}),
            ))
            .await
            .unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn offline_and_injected_failures() {
        let transport = InMemoryTransport::new();
        transport.set_offline(true);
        let err = transport
            .call(request(RemoteOperation::List, json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "store/remote-transport");

        transport.set_offline(false);
        transport.fail_next(crate::store::error::remote_operation("locked"));
        assert!(transport
            .call(request(RemoteOperation::Delete, json!("a")))
            .await
            .is_err());
        assert_eq!(
            transport
                .call(request(RemoteOperation::Delete, json!("a")))
                .await
                .unwrap(),
            json!(false)
        );
        assert_eq!(transport.call_count(RemoteOperation::Delete), 2);
    }

    #[tokio::test]
    async fn normalizer_rewrites_stored_records() {
        let transport = InMemoryTransport::new().with_normalizer(|record| {
            if let Some(name) = record.get("name").and_then(Value::as_str) {
                let upper = name.to_uppercase();
                record.set("name", upper);
            }
        });
        let created = transport
            .call(request(RemoteOperation::Create, json!({"name": "fan"})))
            .await
            .unwrap();
        assert_eq!(created, json!({"name": "FAN", "id": 1}));
        assert_eq!(
            transport.records("points")[0].get("name"),
            Some(&json!("FAN"))
        );
    }
}
