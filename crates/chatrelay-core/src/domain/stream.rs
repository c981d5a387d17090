//! Outbound message types.
//!
//! A request produces zero or more fragment [`Chunk`]s followed by exactly one
//! terminal message: a finished `Chunk` carrying [`MetricsRecord`], or an
//! [`ErrorEnvelope`].

use serde::{Deserialize, Serialize};

/// Completion metrics attached to the terminal success chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Wall time from stream start to finalization, in milliseconds.
    #[serde(rename = "responseTimeMs")]
    pub response_time_ms: u64,
    /// Character count of all forwarded content.
    pub length: u64,
}

/// One outbound streaming message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub request_id: String,
    pub content: String,
    pub finished: bool,
    /// Serialized as `null` on fragment chunks.
    pub metrics: Option<MetricsRecord>,
}

impl Chunk {
    /// A non-terminal chunk carrying one fragment.
    pub fn fragment(request_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            content: content.into(),
            finished: false,
            metrics: None,
        }
    }

    /// The terminal success chunk.
    pub fn finished(request_id: impl Into<String>, metrics: MetricsRecord) -> Self {
        Self {
            request_id: request_id.into(),
            content: String::new(),
            finished: true,
            metrics: Some(metrics),
        }
    }
}

/// Terminal failure message for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub request_id: String,
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            error: error.into(),
        }
    }
}

/// Any message the relay sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outbound {
    Chunk(Chunk),
    Error(ErrorEnvelope),
}

impl Outbound {
    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::Chunk(chunk) => &chunk.request_id,
            Self::Error(envelope) => &envelope.request_id,
        }
    }

    /// Whether this message ends its request.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        match self {
            Self::Chunk(chunk) => chunk.finished,
            Self::Error(_) => true,
        }
    }
}

impl From<Chunk> for Outbound {
    fn from(chunk: Chunk) -> Self {
        Self::Chunk(chunk)
    }
}

impl From<ErrorEnvelope> for Outbound {
    fn from(envelope: ErrorEnvelope) -> Self {
        Self::Error(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fragment_chunk_serializes_null_metrics() {
        let value = serde_json::to_value(Chunk::fragment("r1", "Hel")).unwrap();
        assert_eq!(
            value,
            json!({"request_id": "r1", "content": "Hel", "finished": false, "metrics": null})
        );
    }

    #[test]
    fn finished_chunk_uses_fixed_metric_names() {
        let chunk = Chunk::finished(
            "r1",
            MetricsRecord {
                response_time_ms: 12,
                length: 5,
            },
        );
        let value = serde_json::to_value(chunk).unwrap();
        assert_eq!(value["content"], "");
        assert_eq!(value["finished"], true);
        assert_eq!(value["metrics"], json!({"responseTimeMs": 12, "length": 5}));
    }

    #[test]
    fn outbound_distinguishes_errors_from_chunks() {
        let error: Outbound =
            serde_json::from_str(r#"{"request_id":"r1","error":"boom"}"#).unwrap();
        assert!(matches!(error, Outbound::Error(_)));
        assert!(error.is_terminal());

        let chunk: Outbound = serde_json::from_str(
            r#"{"request_id":"r1","content":"x","finished":false,"metrics":null}"#,
        )
        .unwrap();
        assert!(matches!(chunk, Outbound::Chunk(_)));
        assert!(!chunk.is_terminal());
        assert_eq!(chunk.request_id(), "r1");
    }
}
