//! Sequential per-connection session loop.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::{debug, error, info};

use crate::codec::{self, recover_request_id};
use crate::domain::ErrorEnvelope;
use crate::ports::ClientChannel;
use crate::relay::{AbortReason, Relay, RelayOutcome};

/// Error text sent when an invocation panics.
pub const INTERNAL_ERROR: &str = "Internal error";

/// Tally of what happened on one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Inbound messages read from the channel.
    pub handled: usize,
    /// Invocations that reached `Done`.
    pub completed: usize,
    /// Invocations aborted by a bad payload or an upstream failure.
    pub failed: usize,
    /// Invocations aborted because the client went away.
    pub disconnected: usize,
    /// Invocations that panicked.
    pub panicked: usize,
}

impl SessionSummary {
    pub fn record(&mut self, outcome: &RelayOutcome) {
        match outcome {
            RelayOutcome::Completed { .. } => self.completed += 1,
            RelayOutcome::Aborted {
                reason: AbortReason::Disconnected,
                ..
            } => self.disconnected += 1,
            RelayOutcome::Aborted { .. } => self.failed += 1,
        }
    }
}

/// Serve one connection until the peer closes it.
///
/// Each inbound message runs to completion before the next is read. A panic
/// inside an invocation is contained: the client gets an `Internal error`
/// envelope and the loop keeps going.
pub async fn run_session(relay: &Relay, channel: &mut dyn ClientChannel) -> SessionSummary {
    let mut summary = SessionSummary::default();

    while let Ok(raw) = channel.recv().await {
        summary.handled += 1;
        let result = AssertUnwindSafe(relay.handle(&mut *channel, &raw))
            .catch_unwind()
            .await;

        match result {
            Ok(outcome) => {
                debug!(
                    request_id = %outcome.request_id(),
                    phase = %outcome.phase(),
                    "Invocation finished"
                );
                summary.record(&outcome);
            }
            Err(panic) => {
                summary.panicked += 1;
                let request_id = recover_request_id(&raw);
                error!(
                    request_id = %request_id,
                    "Relay invocation panicked: {}",
                    panic_message(panic.as_ref())
                );
                let envelope = ErrorEnvelope::new(request_id, INTERNAL_ERROR);
                if channel.send(codec::encode(&envelope.into())).await.is_err() {
                    debug!("Client closed before internal error envelope");
                }
            }
        }
    }

    info!(
        handled = summary.handled,
        completed = summary.completed,
        failed = summary.failed,
        disconnected = summary.disconnected,
        panicked = summary.panicked,
        "Session ended"
    );
    summary
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
