//! Domain types for the relay.
//!
//! These types describe the wire-level contract between a client and the
//! relay, independent of the transport carrying them.

mod chat;
mod stream;

pub use chat::{ChatMessage, DEFAULT_MODEL, DEFAULT_TEMPERATURE, MessageRole, RelayRequest};
pub use stream::{Chunk, ErrorEnvelope, MetricsRecord, Outbound};
