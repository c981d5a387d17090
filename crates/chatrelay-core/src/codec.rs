//! Wire codec for relay messages.
//!
//! Inbound text is decoded into a validated [`RelayRequest`]; outbound
//! [`Outbound`] messages are encoded as compact JSON.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{ChatMessage, DEFAULT_MODEL, DEFAULT_TEMPERATURE, Outbound, RelayRequest};

/// Request id reported when none can be recovered from a payload.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Failure to turn inbound text into a [`RelayRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The text is not parseable JSON.
    #[error("Invalid JSON format")]
    MalformedPayload { detail: String },

    /// The text is JSON but does not describe a valid request.
    #[error("Invalid request: {reason}")]
    SchemaViolation {
        request_id: Option<String>,
        reason: String,
    },
}

impl DecodeError {
    /// The request id to report this error under.
    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::MalformedPayload { .. } => UNKNOWN_REQUEST_ID,
            Self::SchemaViolation { request_id, .. } => {
                request_id.as_deref().unwrap_or(UNKNOWN_REQUEST_ID)
            }
        }
    }

    fn schema(request_id: Option<String>, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            request_id,
            reason: reason.into(),
        }
    }
}

#[derive(Deserialize)]
struct WireRequest {
    request_id: String,
    #[serde(default = "default_model")]
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default = "default_stream")]
    stream: bool,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

const fn default_stream() -> bool {
    true
}

/// Decode and validate one inbound request.
///
/// # Errors
///
/// Returns [`DecodeError::MalformedPayload`] when `raw` is not JSON and
/// [`DecodeError::SchemaViolation`] when it is JSON but not a valid request.
pub fn decode(raw: &str) -> Result<RelayRequest, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::MalformedPayload {
            detail: e.to_string(),
        })?;

    let request_id = request_id_of(&value);

    if !value.is_object() {
        return Err(DecodeError::schema(
            request_id,
            "payload must be a JSON object",
        ));
    }

    let wire: WireRequest = serde_json::from_value(value)
        .map_err(|e| DecodeError::schema(request_id.clone(), e.to_string()))?;

    if wire.request_id.is_empty() {
        return Err(DecodeError::schema(None, "request_id must not be empty"));
    }
    if wire.messages.is_empty() {
        return Err(DecodeError::schema(
            Some(wire.request_id),
            "messages must not be empty",
        ));
    }

    Ok(RelayRequest {
        request_id: wire.request_id,
        model: wire.model,
        messages: wire.messages,
        temperature: wire.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        max_tokens: wire.max_tokens,
        stream: wire.stream,
    })
}

/// Best-effort request id for error reporting on arbitrary inbound text.
#[must_use]
pub fn recover_request_id(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .as_ref()
        .and_then(request_id_of)
        .unwrap_or_else(|| UNKNOWN_REQUEST_ID.to_string())
}

fn request_id_of(value: &Value) -> Option<String> {
    match value.get("request_id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        v @ (Value::Number(_) | Value::Bool(_)) => Some(v.to_string()),
        _ => None,
    }
}

/// Encode one outbound message as JSON text.
#[must_use]
pub fn encode(message: &Outbound) -> String {
    // Plain structs of strings, bools and integers always serialize.
    serde_json::to_string(message).unwrap_or_default()
}
