//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the relay expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No HTTP or WebSocket types in any signature
//! - Disconnection is a value (`ConnectionClosed`), never a panic
//! - Upstream streams are lazy and dropped, not drained, on abort

pub mod client_channel;
pub mod generation;

pub use client_channel::{ClientChannel, ConnectionClosed};
pub use generation::{FragmentStream, GenerationParams, GenerationPort, UpstreamError};

#[cfg(test)]
pub use generation::MockGenerationPort;
