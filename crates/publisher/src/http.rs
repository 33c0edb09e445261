//! Shared HTTP plumbing and failure classification.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use socialcast_common::{AppError, AppResult};

use crate::error::PublishError;

/// Graph API error codes that mean "slow down" rather than "wrong request".
pub const GRAPH_THROTTLE_CODES: [i64; 4] = [4, 17, 32, 613];

const MAX_MESSAGE_LEN: usize = 500;

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

/// Build a client with the provider timeout.
pub fn build_client(timeout: Duration) -> AppResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("socialcast/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Classify a non-success response.
#[must_use]
pub fn classify(status: StatusCode, body: &str) -> PublishError {
    let graph = serde_json::from_str::<GraphErrorEnvelope>(body)
        .ok()
        .map(|e| e.error);
    let code = graph.as_ref().and_then(|g| g.code);
    let message = graph
        .and_then(|g| g.message)
        .unwrap_or_else(|| short(body, status));

    let throttled = code.is_some_and(|c| GRAPH_THROTTLE_CODES.contains(&c));
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() || throttled {
        PublishError::Transient {
            status: Some(status.as_u16()),
            message,
        }
    } else {
        PublishError::Permanent {
            status: Some(status.as_u16()),
            message,
        }
    }
}

/// Classify a transport failure.
#[must_use]
pub fn classify_transport(err: &reqwest::Error) -> PublishError {
    if err.is_timeout() {
        PublishError::transient(format!("request timed out: {err}"))
    } else if err.is_connect() || err.is_request() {
        PublishError::transient(format!("connection failed: {err}"))
    } else {
        PublishError::permanent(format!("request failed: {err}"))
    }
}

/// Send a request and return the JSON body of a successful response.
///
/// A 2xx body carrying a Graph `error` object is classified like an error
/// response.
pub async fn send_json(request: RequestBuilder) -> Result<Value, PublishError> {
    let response = request.send().await.map_err(|e| classify_transport(&e))?;
    let status = response.status();
    let body = response.text().await.map_err(|e| classify_transport(&e))?;

    if !status.is_success() {
        return Err(classify(status, &body));
    }

    let value: Value = serde_json::from_str(&body).map_err(|e| PublishError::Permanent {
        status: Some(status.as_u16()),
        message: format!("unreadable response body: {e}"),
    })?;

    if value.get("error").is_some_and(Value::is_object) {
        return Err(classify(StatusCode::BAD_REQUEST, &body));
    }

    Ok(value)
}

/// Read an id field, accepting strings and numbers.
#[must_use]
pub fn id_field(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read the id of a created object. Its absence is permanent: the post may
/// exist and a retry could publish it twice.
pub fn require_id(value: &Value, field: &str) -> Result<String, PublishError> {
    id_field(value, field).ok_or_else(|| {
        PublishError::permanent(format!("response did not include {field}: {value}"))
    })
}

fn short(body: &str, status: StatusCode) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("HTTP {status}");
    }
    socialcast_format::truncate(trimmed, MAX_MESSAGE_LEN)
}
