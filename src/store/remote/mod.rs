use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use serde_json::Value;

use crate::store::error::StoreResult;

pub mod http;
pub mod in_memory;
pub mod remote_store;
pub mod rpc_error;

/// Procedures a remote store endpoint answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl RemoteOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteOperation::Create => "create",
            RemoteOperation::Read => "read",
            RemoteOperation::Update => "update",
            RemoteOperation::Delete => "delete",
            RemoteOperation::List => "list",
        }
    }
}

impl Display for RemoteOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One procedure call against a named remote store.
///
/// Payloads per operation: `create`/`update` carry the record, `read`/`delete` carry the
/// identity, `list` carries [`Query::to_params`](crate::store::Query::to_params).
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteRequest {
    pub store: String,
    pub operation: RemoteOperation,
    pub payload: Value,
}

impl RemoteRequest {
    pub fn new(store: impl Into<String>, operation: RemoteOperation, payload: Value) -> Self {
        Self {
            store: store.into(),
            operation,
            payload,
        }
    }
}

/// Request/response procedure-call mechanism behind a [`RemoteStore`].
///
/// Implementations report network-level failures as `RemoteTransport` errors and
/// endpoint-reported failures as `RemoteOperation` (or the more specific duplicate
/// identity / not found) errors. Timeouts are the transport's own business.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait RemoteTransport: Send + Sync + 'static {
    async fn call(&self, request: RemoteRequest) -> StoreResult<Value>;
}

pub use http::{HttpTransport, HttpTransportSettings};
pub use in_memory::InMemoryTransport;
pub use remote_store::{RemoteStore, RemoteStoreOptions};
pub use rpc_error::{map_error_payload, map_http_error};
