#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod client;
pub mod models;
pub mod params;
pub mod sse;

pub use client::{OpenAiClient, OpenAiConfig};
pub use models::{ChatCompletionChunk, OpenAiModel, ProviderError};
pub use params::{
    CompletionRequest, DEFAULT_REASONING_MAX_COMPLETION_TOKENS, ParameterShape, REASONING_MODEL,
};
pub use sse::fragment_stream;
