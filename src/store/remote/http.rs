use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value as JsonValue};
use url::Url;

use crate::store::constants::DEFAULT_HTTP_TIMEOUT_MS;
use crate::store::error::{
    internal_error, invalid_argument, remote_transport, StoreError, StoreResult,
};

use super::rpc_error::{map_error_payload, map_http_error};
use super::{RemoteRequest, RemoteTransport};

#[derive(Clone, Debug)]
pub struct HttpTransportSettings {
    /// Base URL; calls go to `{endpoint}/{store}/{operation}`.
    pub endpoint: Url,
    pub request_timeout: Duration,
    pub headers: BTreeMap<String, String>,
}

impl HttpTransportSettings {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            request_timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
            headers: BTreeMap::new(),
        }
    }

    pub fn parse(endpoint: &str) -> StoreResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| invalid_argument(format!("invalid endpoint `{endpoint}`: {err}")))?;
        Ok(Self::new(endpoint))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// JSON-over-HTTP transport for the dashboard's store endpoints.
///
/// Each call is a `POST` with body `{"data": payload}`. Successful responses carry
/// `{"data": result}`; endpoints may also answer `200` with an `{"error": ...}` body.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    settings: HttpTransportSettings,
}

impl HttpTransport {
    pub fn new(settings: HttpTransportSettings) -> StoreResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|err| internal_error(err.to_string()))?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: Client, settings: HttpTransportSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &HttpTransportSettings {
        &self.settings
    }

    fn url_for(&self, request: &RemoteRequest) -> String {
        format!(
            "{}/{}/{}",
            self.settings.endpoint.as_str().trim_end_matches('/'),
            request.store,
            request.operation
        )
    }
}

fn map_reqwest_error(err: reqwest::Error) -> StoreError {
    if err.is_decode() {
        return internal_error(format!("unable to decode store response: {err}"));
    }
    remote_transport(format!("store request failed: {err}"))
}

fn decode_success(status: StatusCode, text: &str) -> StoreResult<JsonValue> {
    if text.is_empty() || status == StatusCode::NO_CONTENT {
        return Ok(JsonValue::Null);
    }
    let mut body: JsonValue = serde_json::from_str(text)
        .map_err(|err| internal_error(format!("Response is not valid JSON: {err}")))?;
    if body.get("error").is_some_and(|error| !error.is_null()) {
        return Err(map_error_payload(&body));
    }
    if let Some(data) = body.get_mut("data") {
        return Ok(data.take());
    }
    Ok(body)
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl RemoteTransport for HttpTransport {
    async fn call(&self, request: RemoteRequest) -> StoreResult<JsonValue> {
        let url = self.url_for(&request);
        log::debug!("POST {url}");

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&json!({ "data": request.payload }));
        #[cfg(not(target_arch = "wasm32"))]
        {
            builder = builder.timeout(self.settings.request_timeout);
        }
        for (name, value) in &self.settings.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;
        if status.is_success() {
            decode_success(status, &text)
        } else {
            Err(map_http_error(status, &text))
        }
    }
}
