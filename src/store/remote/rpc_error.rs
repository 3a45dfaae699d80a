use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::store::error::{
    duplicate_identity, not_found, remote_operation, remote_transport, StoreError,
};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<RemoteErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct RemoteErrorPayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Maps an endpoint error body (`{"error": {"message": ..., "status": ...}}`) to a store
/// error. The server message is kept verbatim.
pub fn map_error_payload(body: &Value) -> StoreError {
    match serde_json::from_value::<ErrorBody>(body.clone())
        .ok()
        .and_then(|parsed| parsed.error)
    {
        Some(payload) => {
            let message = payload
                .message
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| "Remote operation failed".to_string());
            match payload.status.as_deref() {
                Some(status) => map_status(status, message),
                None => remote_operation(message),
            }
        }
        None => remote_operation(format!("Remote operation failed: {body}")),
    }
}

pub fn map_http_error(status: StatusCode, body: &str) -> StoreError {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if parsed.get("error").is_some() {
            return map_error_payload(&parsed);
        }
    }

    let message = status
        .canonical_reason()
        .unwrap_or("HTTP error")
        .to_string();
    match status {
        StatusCode::NOT_FOUND => not_found(message),
        StatusCode::CONFLICT => duplicate_identity(message),
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => remote_transport(message),
        _ => remote_operation(message),
    }
}

fn map_status(status: &str, message: String) -> StoreError {
    match status {
        "ALREADY_EXISTS" => duplicate_identity(message),
        "NOT_FOUND" => not_found(message),
        "UNAVAILABLE" | "DEADLINE_EXCEEDED" => remote_transport(message),
        _ => remote_operation(message),
    }
}
