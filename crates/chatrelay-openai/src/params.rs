//! Per-model request shaping.

use chatrelay_core::{ChatMessage, GenerationParams};
use serde::Serialize;

/// Model identifier of the reasoning variant.
pub const REASONING_MODEL: &str = "o3-mini";

/// Token limit sent to the reasoning model when the request sets none.
pub const DEFAULT_REASONING_MAX_COMPLETION_TOKENS: u32 = 4096;

/// How generation parameters are expressed for a given model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterShape {
    /// No temperature; token limit as `max_completion_tokens`.
    Reasoning,
    /// Temperature always; `max_tokens` only when set.
    Standard,
}

impl ParameterShape {
    #[must_use]
    pub fn for_model(model: &str) -> Self {
        if model == REASONING_MODEL {
            Self::Reasoning
        } else {
            Self::Standard
        }
    }
}

/// Streaming Chat Completions request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    pub stream: bool,
}

impl CompletionRequest {
    /// Shape `params` for the model they name.
    #[must_use]
    pub fn from_params(params: GenerationParams) -> Self {
        let shape = ParameterShape::for_model(&params.model);
        let (temperature, max_tokens, max_completion_tokens) = match shape {
            ParameterShape::Reasoning => (
                None,
                None,
                Some(
                    params
                        .max_tokens
                        .unwrap_or(DEFAULT_REASONING_MAX_COMPLETION_TOKENS),
                ),
            ),
            ParameterShape::Standard => (Some(params.temperature), params.max_tokens, None),
        };

        Self {
            model: params.model,
            messages: params.messages,
            temperature,
            max_tokens,
            max_completion_tokens,
            stream: true,
        }
    }
}
