use std::sync::Arc;

use async_lock::OnceCell;
use async_trait::async_trait;
use serde_json::Value;

use crate::store::collection::{AddOptions, Collection};
use crate::store::constants::DEFAULT_ID_PROPERTY;
use crate::store::error::{internal_error, StoreErrorCode, StoreResult};
use crate::store::model::{Identity, Record};
use crate::store::observer::{CollectionObserver, ListenerRegistration, ObserverRegistry};
use crate::store::query::{Query, QueryResults};

use super::{RemoteOperation, RemoteRequest, RemoteTransport};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteStoreOptions {
    /// Name the transport routes calls by.
    pub store_name: String,
    pub id_property: String,
    /// Fetch the whole collection once and answer every later query from that snapshot.
    /// The snapshot is never refreshed, so only use it for small reference data.
    pub query_locally: bool,
}

impl RemoteStoreOptions {
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            id_property: DEFAULT_ID_PROPERTY.to_string(),
            query_locally: false,
        }
    }

    pub fn with_id_property(mut self, id_property: impl Into<String>) -> Self {
        self.id_property = id_property.into();
        self
    }

    pub fn with_query_locally(mut self, query_locally: bool) -> Self {
        self.query_locally = query_locally;
        self
    }
}

/// Collection adapter that turns each operation into a call on a [`RemoteTransport`].
///
/// The server is authoritative for identities: whatever identity it confirms for a
/// created record is the one returned, even if the client proposed another. Errors are
/// passed through untouched and nothing is retried. A remote "not found" is reported as
/// `None`/`false` like any other absent record.
pub struct RemoteStore {
    transport: Arc<dyn RemoteTransport>,
    options: RemoteStoreOptions,
    snapshot: OnceCell<Vec<Record>>,
    observers: ObserverRegistry,
}

impl RemoteStore {
    pub fn new(transport: Arc<dyn RemoteTransport>, options: RemoteStoreOptions) -> Self {
        Self {
            transport,
            options,
            snapshot: OnceCell::new(),
            observers: ObserverRegistry::new(),
        }
    }

    pub fn options(&self) -> &RemoteStoreOptions {
        &self.options
    }

    async fn invoke(&self, operation: RemoteOperation, payload: Value) -> StoreResult<Value> {
        let request = RemoteRequest::new(self.options.store_name.clone(), operation, payload);
        log::debug!("remote call {}.{}", request.store, operation);
        self.transport.call(request).await.map_err(|err| {
            if err.code != StoreErrorCode::NotFound {
                log::warn!(
                    "remote call {}.{} failed: {err}",
                    self.options.store_name,
                    operation
                );
            }
            err
        })
    }

    /// Reads the record the server confirmed. The response is either the stored record or
    /// a bare identity; without either the client's own identity is kept.
    fn confirmed(&self, response: Value, mut sent: Record) -> StoreResult<(Identity, Record)> {
        let id_property = self.options.id_property.as_str();
        match response {
            Value::Object(fields) => {
                let record = Record::from_fields(fields);
                let id = record
                    .identity(id_property)
                    .or_else(|| sent.identity(id_property))
                    .ok_or_else(|| missing_identity(&self.options.store_name))?;
                let mut record = record;
                record.set_identity(id_property, &id);
                Ok((id, record))
            }
            other => {
                let id = Identity::from_value(&other)
                    .or_else(|| sent.identity(id_property))
                    .ok_or_else(|| missing_identity(&self.options.store_name))?;
                sent.set_identity(id_property, &id);
                Ok((id, sent))
            }
        }
    }

    async fn list(&self, params: Value) -> StoreResult<Vec<Record>> {
        match self.invoke(RemoteOperation::List, params).await? {
            Value::Array(items) => items.into_iter().map(Record::from_value).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(internal_error(format!(
                "{}.list returned a non-list response: {other}",
                self.options.store_name
            ))),
        }
    }
}

fn missing_identity(store: &str) -> crate::store::error::StoreError {
    internal_error(format!("{store}: server did not confirm an identity"))
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Collection for RemoteStore {
    fn id_property(&self) -> &str {
        &self.options.id_property
    }

    async fn get(&self, id: &Identity) -> StoreResult<Option<Record>> {
        match self.invoke(RemoteOperation::Read, id.to_value()).await {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Record::from_value(value).map(Some),
            Err(err) if err.code == StoreErrorCode::NotFound => Ok(None),
            Err(err) => Err(err),
        }
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
        let operation = if options.overwrite {
            RemoteOperation::Update
        } else {
            RemoteOperation::Create
        };
        let response = self.invoke(operation, record.clone().into_value()).await?;
        let (id, stored) = self.confirmed(response, record)?;
        if options.overwrite {
            self.observers.notify_updated(&stored);
        } else {
            self.observers.notify_added(&stored);
        }
        Ok((id, stored))
    }

    async fn put_confirmed(&self, record: Record) -> StoreResult<(Identity, Record)> {
        self.add_confirmed(record, AddOptions::overwrite()).await
    }

    async fn remove(&self, id: &Identity) -> StoreResult<bool> {
        let removed = match self.invoke(RemoteOperation::Delete, id.to_value()).await {
            Ok(Value::Bool(removed)) => removed,
            Ok(_) => true,
            Err(err) if err.code == StoreErrorCode::NotFound => false,
            Err(err) => return Err(err),
        };
        if removed {
            self.observers.notify_removed(id);
        }
        Ok(removed)
    }

    async fn query(&self, query: &Query) -> StoreResult<QueryResults> {
        if self.options.query_locally {
            let snapshot = self
                .snapshot
                .get_or_try_init(|| async {
                    let records = self.list(Query::new().to_params()).await?;
                    log::debug!(
                        "{}: cached {} records for local queries",
                        self.options.store_name,
                        records.len()
                    );
                    Ok::<_, crate::store::error::StoreError>(records)
                })
                .await?;
            return Ok(query.apply(snapshot.iter().cloned()));
        }
        let records = self.list(query.to_params()).await?;
        Ok(query.apply(records))
    }

    fn subscribe(&self, observer: CollectionObserver) -> ListenerRegistration {
        self.observers.register(observer)
    }
}
