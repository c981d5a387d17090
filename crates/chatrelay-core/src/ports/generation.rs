//! Generation port for upstream text providers.
//!
//! This port abstracts a remote language-model provider that produces a
//! completion as a lazy stream of text fragments. Provider-specific request
//! shaping lives in the adapter, not here.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use crate::domain::{ChatMessage, RelayRequest};

/// A lazy, finite, non-restartable sequence of text fragments.
///
/// Fragments may be empty strings. The sequence ends after the first error.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

/// Parameters for one generation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

impl From<&RelayRequest> for GenerationParams {
    fn from(request: &RelayRequest) -> Self {
        Self {
            messages: request.messages.clone(),
            model: request.model.clone(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

/// Errors raised by a generation provider.
///
/// The display text is the provider's own message and is forwarded to the
/// client verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The provider answered the call with a non-success status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The call or the response body failed at the transport level.
    #[error("{0}")]
    Transport(String),

    /// The provider reported an error inside an accepted stream.
    #[error("{0}")]
    Provider(String),
}

impl UpstreamError {
    /// HTTP status reported by the provider, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(_) | Self::Provider(_) => None,
        }
    }
}

/// Port for opening upstream generation streams.
///
/// A single attempt is made per call; implementations do not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationPort: Send + Sync {
    /// Open a completion stream for the given parameters.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError` if the provider cannot be reached or rejects
    /// the call before streaming begins.
    async fn open_stream(&self, params: GenerationParams) -> Result<FragmentStream, UpstreamError>;
}
