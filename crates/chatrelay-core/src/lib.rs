#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod codec;
pub mod domain;
pub mod ports;
pub mod relay;
pub mod session;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use codec::{DecodeError, UNKNOWN_REQUEST_ID, decode, encode, recover_request_id};
pub use domain::{
    ChatMessage, Chunk, DEFAULT_MODEL, DEFAULT_TEMPERATURE, ErrorEnvelope, MessageRole,
    MetricsRecord, Outbound, RelayRequest,
};
pub use ports::{
    ClientChannel, ConnectionClosed, FragmentStream, GenerationParams, GenerationPort,
    UpstreamError,
};
pub use relay::{AbortReason, Phase, Relay, RelayOutcome};
pub use session::{INTERNAL_ERROR, SessionSummary, run_session};
pub use settings::{
    DEFAULT_API_DESCRIPTION, DEFAULT_API_NAME, DEFAULT_HOST, DEFAULT_OPENAI_BASE_URL,
    DEFAULT_PORT, LogLevel, Settings, SettingsError, parse_origins, validate_settings,
};
