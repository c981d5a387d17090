//! Client channel port.
//!
//! A persistent, bidirectional text channel to one client. The relay reads
//! inbound requests and writes outbound messages through it and watches
//! [`ClientChannel::closed`] at every suspension point.

use async_trait::async_trait;
use thiserror::Error;

/// The client has gone away; nothing more can be sent or received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("client connection closed")]
pub struct ConnectionClosed;

/// Port for one client connection.
#[async_trait]
pub trait ClientChannel: Send + Sync {
    /// Wait for the next inbound text message.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` once the peer has closed the channel.
    async fn recv(&mut self) -> Result<String, ConnectionClosed>;

    /// Send one outbound text message.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` if the channel closed before or during the
    /// send.
    async fn send(&mut self, text: String) -> Result<(), ConnectionClosed>;

    /// Resolve once the channel is closed.
    ///
    /// Cancel-safe; may be polled repeatedly from `select!`.
    async fn closed(&self);
}
