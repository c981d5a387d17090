//! Known models and provider wire types.

use serde::{Deserialize, Serialize};

/// Models the relay advertises.
///
/// Informational only: any model string is passed through to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenAiModel {
    Gpt4o,
    Gpt4oMini,
    O3Mini,
}

impl OpenAiModel {
    pub const ALL: [Self; 3] = [Self::Gpt4o, Self::Gpt4oMini, Self::O3Mini];

    /// Provider model identifier.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4oMini => "gpt-4o-mini",
            Self::O3Mini => "o3-mini",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Gpt4o => "GPT-4o",
            Self::Gpt4oMini => "GPT 4o-mini",
            Self::O3Mini => "o3-mini",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Gpt4o => "Great for most tasks",
            Self::Gpt4oMini => "Faster for most questions",
            Self::O3Mini => "Fast at advanced reasoning",
        }
    }

    /// Whether the provider treats this model as a reasoning model.
    #[must_use]
    pub const fn is_reasoning(self) -> bool {
        matches!(self, Self::O3Mini)
    }

    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.id() == id)
    }
}

impl std::fmt::Display for OpenAiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

// =============================================================================
// Streaming wire types
// =============================================================================

/// One `data:` payload of a streaming chat completion.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// In-stream failure reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderError>,
}

impl ChatCompletionChunk {
    /// Text delta of the first choice, or `""` when absent.
    #[must_use]
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Provider error object, as found in error bodies and in-stream errors.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProviderError {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

/// Body of a non-success provider response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProviderErrorBody {
    pub error: ProviderError,
}

/// Extract the provider's message from an error response body.
///
/// Falls back to the raw body text, or the status line when the body is empty.
pub(crate) fn provider_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ProviderErrorBody>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => format!("Upstream returned HTTP {status}"),
    }
}
