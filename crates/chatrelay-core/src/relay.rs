//! The per-request relay state machine.
//!
//! One [`Relay::handle`] call drives a single raw inbound message through
//! `Validating → Streaming → Finalizing → Done`, or into `Aborted`. Each
//! forwarded fragment is sent as soon as it arrives. Every call ends with
//! exactly one terminal message unless the client disconnected first.

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::codec::{self, DecodeError, UNKNOWN_REQUEST_ID};
use crate::domain::{Chunk, ErrorEnvelope, MetricsRecord, Outbound};
use crate::ports::{ClientChannel, GenerationParams, GenerationPort, UpstreamError};

/// Lifecycle phase of one relay invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Validating,
    Streaming,
    Finalizing,
    Done,
    Aborted,
}

impl Phase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Validating)
                | (Self::Validating | Self::Streaming, Self::Aborted)
                | (Self::Validating, Self::Streaming)
                | (Self::Streaming, Self::Finalizing)
                | (Self::Finalizing, Self::Done)
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Streaming => "streaming",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an invocation ended in [`Phase::Aborted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The inbound payload failed decoding or validation.
    Rejected(DecodeError),
    /// The upstream provider failed to open or failed mid-stream.
    Upstream(UpstreamError),
    /// The client went away before a terminal message could be sent.
    Disconnected,
}

/// Result of one relay invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Upstream finished and the invocation reached [`Phase::Done`].
    Completed {
        request_id: String,
        forwarded: usize,
        metrics: MetricsRecord,
        /// False when the client closed before the finished chunk went out.
        delivered: bool,
    },
    /// The invocation ended in [`Phase::Aborted`].
    Aborted {
        request_id: String,
        forwarded: usize,
        reason: AbortReason,
    },
}

impl RelayOutcome {
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Completed { .. } => Phase::Done,
            Self::Aborted { .. } => Phase::Aborted,
        }
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::Completed { request_id, .. } | Self::Aborted { request_id, .. } => request_id,
        }
    }

    /// Number of fragment chunks sent to the client.
    #[must_use]
    pub const fn forwarded(&self) -> usize {
        match self {
            Self::Completed { forwarded, .. } | Self::Aborted { forwarded, .. } => *forwarded,
        }
    }
}

/// Ephemeral state for one request.
struct RelayInvocation {
    request_id: String,
    buffer: String,
    forwarded: usize,
    started: Instant,
    phase: Phase,
}

impl RelayInvocation {
    fn new() -> Self {
        Self {
            request_id: UNKNOWN_REQUEST_ID.to_string(),
            buffer: String::new(),
            forwarded: 0,
            started: Instant::now(),
            phase: Phase::Idle,
        }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal relay transition {} -> {next}",
            self.phase
        );
        debug!(request_id = %self.request_id, from = %self.phase, to = %next, "Relay phase");
        self.phase = next;
    }

    /// Buffer a fragment and build its chunk; empty fragments produce nothing.
    fn accept(&mut self, fragment: String) -> Option<Chunk> {
        if fragment.is_empty() {
            return None;
        }
        self.buffer.push_str(&fragment);
        Some(Chunk::fragment(self.request_id.clone(), fragment))
    }

    fn metrics(&self) -> MetricsRecord {
        MetricsRecord {
            response_time_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            length: self.buffer.chars().count() as u64,
        }
    }

    fn abort(mut self, reason: AbortReason) -> RelayOutcome {
        self.advance(Phase::Aborted);
        RelayOutcome::Aborted {
            request_id: self.request_id,
            forwarded: self.forwarded,
            reason,
        }
    }
}

/// Relays upstream generations to client channels.
///
/// Cheap to clone; the upstream port is shared behind an `Arc`.
#[derive(Clone)]
pub struct Relay {
    upstream: Arc<dyn GenerationPort>,
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay").finish_non_exhaustive()
    }
}

impl Relay {
    pub fn new(upstream: Arc<dyn GenerationPort>) -> Self {
        Self { upstream }
    }

    /// Drive one raw inbound message to a terminal state.
    ///
    /// Never fails: every problem is reported to the client as an error
    /// envelope, or silently dropped if the client is gone.
    pub async fn handle(&self, channel: &mut dyn ClientChannel, raw: &str) -> RelayOutcome {
        let mut invocation = RelayInvocation::new();
        invocation.advance(Phase::Validating);

        let request = match codec::decode(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(request_id = %e.request_id(), "Rejected inbound message: {e}");
                invocation.request_id = e.request_id().to_string();
                let envelope = ErrorEnvelope::new(invocation.request_id.clone(), e.to_string());
                send_outbound(channel, envelope).await;
                return invocation.abort(AbortReason::Rejected(e));
            }
        };

        invocation.request_id.clone_from(&request.request_id);
        let params = GenerationParams::from(&request);
        info!(
            request_id = %invocation.request_id,
            model = %request.model,
            messages = request.messages.len(),
            "Relaying request"
        );
        invocation.started = Instant::now();
        invocation.advance(Phase::Streaming);

        let opened = tokio::select! {
            biased;
            () = channel.closed() => None,
            result = self.upstream.open_stream(params) => Some(result),
        };
        let mut fragments = match opened {
            None => {
                info!(request_id = %invocation.request_id, "Client closed while opening upstream");
                return invocation.abort(AbortReason::Disconnected);
            }
            Some(Err(e)) => return fail_upstream(channel, invocation, e).await,
            Some(Ok(stream)) => stream,
        };

        loop {
            let next = tokio::select! {
                biased;
                () = channel.closed() => None,
                item = fragments.next() => Some(item),
            };
            match next {
                None => {
                    info!(
                        request_id = %invocation.request_id,
                        forwarded = invocation.forwarded,
                        "Client closed mid-stream"
                    );
                    return invocation.abort(AbortReason::Disconnected);
                }
                Some(Some(Ok(fragment))) => {
                    let Some(chunk) = invocation.accept(fragment) else {
                        continue;
                    };
                    if channel.send(codec::encode(&chunk.into())).await.is_err() {
                        info!(
                            request_id = %invocation.request_id,
                            forwarded = invocation.forwarded,
                            "Client closed mid-stream"
                        );
                        return invocation.abort(AbortReason::Disconnected);
                    }
                    invocation.forwarded += 1;
                }
                Some(Some(Err(e))) => return fail_upstream(channel, invocation, e).await,
                Some(None) => break,
            }
        }
        drop(fragments);

        invocation.advance(Phase::Finalizing);
        let metrics = invocation.metrics();
        let finished = Chunk::finished(invocation.request_id.clone(), metrics);
        let delivered = channel.send(codec::encode(&finished.into())).await.is_ok();
        if !delivered {
            debug!(request_id = %invocation.request_id, "Client closed before finished chunk");
        }
        invocation.advance(Phase::Done);

        info!(
            request_id = %invocation.request_id,
            response_time_ms = metrics.response_time_ms,
            length = metrics.length,
            forwarded = invocation.forwarded,
            "Relay completed"
        );

        RelayOutcome::Completed {
            request_id: invocation.request_id,
            forwarded: invocation.forwarded,
            metrics,
            delivered,
        }
    }
}

async fn fail_upstream(
    channel: &mut dyn ClientChannel,
    invocation: RelayInvocation,
    e: UpstreamError,
) -> RelayOutcome {
    error!(
        request_id = %invocation.request_id,
        status = ?e.status(),
        "Upstream generation failed: {e}"
    );
    let envelope = ErrorEnvelope::new(invocation.request_id.clone(), e.to_string());
    if !send_outbound(channel, envelope).await {
        return invocation.abort(AbortReason::Disconnected);
    }
    invocation.abort(AbortReason::Upstream(e))
}

/// Send a terminal error; returns whether the client received it.
async fn send_outbound(channel: &mut dyn ClientChannel, message: impl Into<Outbound>) -> bool {
    let message = message.into();
    let delivered = channel.send(codec::encode(&message)).await.is_ok();
    if !delivered {
        debug!(request_id = %message.request_id(), "Client closed before error envelope");
    }
    delivered
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ports::MockGenerationPort;
    use crate::testing::{RecordingChannel, ScriptedUpstream, Step};

    const HI: &str = r#"{"request_id":"t1","messages":[{"role":"user","content":"hi"}]}"#;

    fn relay(upstream: &ScriptedUpstream) -> Relay {
        Relay::new(Arc::new(upstream.clone()))
    }

    fn chunk(outbound: &Outbound) -> &Chunk {
        match outbound {
            Outbound::Chunk(chunk) => chunk,
            Outbound::Error(e) => panic!("expected chunk, got error {e:?}"),
        }
    }

    fn envelope(outbound: &Outbound) -> &ErrorEnvelope {
        match outbound {
            Outbound::Error(e) => e,
            Outbound::Chunk(c) => panic!("expected error envelope, got chunk {c:?}"),
        }
    }

    #[tokio::test]
    async fn forwards_each_fragment_then_finishes() {
        let upstream = ScriptedUpstream::fragments(["Hel", "lo"]);
        let mut channel = RecordingChannel::new();

        let outcome = relay(&upstream).handle(&mut channel, HI).await;

        let sent = channel.sent_outbound();
        assert_eq!(sent.len(), 3);
        assert_eq!(chunk(&sent[0]), &Chunk::fragment("t1", "Hel"));
        assert_eq!(chunk(&sent[1]), &Chunk::fragment("t1", "lo"));
        let last = chunk(&sent[2]);
        assert!(last.finished);
        assert_eq!(last.content, "");
        assert_eq!(last.metrics.map(|m| m.length), Some(5));

        assert_eq!(outcome.phase(), Phase::Done);
        assert_eq!(outcome.request_id(), "t1");
        assert_eq!(outcome.forwarded(), 2);
        assert!(matches!(outcome, RelayOutcome::Completed { delivered: true, .. }));
    }

    #[tokio::test]
    async fn empty_fragments_are_not_forwarded() {
        let upstream = ScriptedUpstream::fragments(["", "a", "", "", "b", ""]);
        let mut channel = RecordingChannel::new();

        let outcome = relay(&upstream).handle(&mut channel, HI).await;

        let sent = channel.sent_outbound();
        assert_eq!(sent.len(), 3);
        assert_eq!(chunk(&sent[0]).content, "a");
        assert_eq!(chunk(&sent[1]).content, "b");
        assert!(chunk(&sent[2]).finished);
        assert_eq!(outcome.forwarded(), 2);
    }

    #[tokio::test]
    async fn empty_upstream_sends_only_finished_chunk() {
        let upstream = ScriptedUpstream::fragments(Vec::<String>::new());
        let mut channel = RecordingChannel::new();

        relay(&upstream).handle(&mut channel, HI).await;

        let sent = channel.sent_outbound();
        assert_eq!(sent.len(), 1);
        let last = chunk(&sent[0]);
        assert!(last.finished);
        assert_eq!(last.metrics.map(|m| m.length), Some(0));
    }

    #[tokio::test]
    async fn length_counts_unicode_scalars() {
        let upstream = ScriptedUpstream::fragments(["héllo", " 世界", "🦀"]);
        let mut channel = RecordingChannel::new();

        let outcome = relay(&upstream).handle(&mut channel, HI).await;

        let RelayOutcome::Completed { metrics, .. } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(metrics.length, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn response_time_covers_upstream_delays() {
        let upstream = ScriptedUpstream::new(vec![
            Step::Delay(Duration::from_millis(150)),
            Step::Fragment("a".into()),
            Step::Delay(Duration::from_millis(100)),
            Step::Fragment("b".into()),
        ]);
        let mut channel = RecordingChannel::new();

        let outcome = relay(&upstream).handle(&mut channel, HI).await;

        let RelayOutcome::Completed { metrics, .. } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert!(metrics.response_time_ms >= 250, "{metrics:?}");
        assert!(metrics.response_time_ms < 300, "{metrics:?}");
    }

    #[tokio::test]
    async fn passes_request_parameters_upstream() {
        let upstream = ScriptedUpstream::fragments(["ok"]);
        let mut channel = RecordingChannel::new();
        let raw = r#"{"request_id":"p","model":"o3-mini","max_tokens":64,"temperature":0.1,
            "messages":[{"role":"system","content":"s"},{"role":"user","content":"u"}]}"#;

        relay(&upstream).handle(&mut channel, raw).await;

        let calls = upstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "o3-mini");
        assert_eq!(calls[0].max_tokens, Some(64));
        assert_eq!(calls[0].messages.len(), 2);
        assert!((calls[0].temperature - 0.1).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn malformed_payload_yields_unknown_error() {
        let upstream = ScriptedUpstream::fragments(["never"]);
        let mut channel = RecordingChannel::new();

        let outcome = relay(&upstream).handle(&mut channel, "{invalid json}").await;

        let sent = channel.sent_outbound();
        assert_eq!(sent.len(), 1);
        let err = envelope(&sent[0]);
        assert_eq!(err.request_id, UNKNOWN_REQUEST_ID);
        assert!(err.error.contains("Invalid JSON format"));
        assert!(upstream.calls().is_empty());
        assert!(matches!(
            outcome,
            RelayOutcome::Aborted {
                reason: AbortReason::Rejected(DecodeError::MalformedPayload { .. }),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn schema_violation_reports_recovered_id() {
        let upstream = ScriptedUpstream::fragments(["never"]);
        let mut channel = RecordingChannel::new();

        let outcome = relay(&upstream)
            .handle(&mut channel, r#"{"request_id":"abc","messages":[]}"#)
            .await;

        let sent = channel.sent_outbound();
        assert_eq!(sent.len(), 1);
        let err = envelope(&sent[0]);
        assert_eq!(err.request_id, "abc");
        assert!(err.error.starts_with("Invalid request"));
        assert_eq!(outcome.phase(), Phase::Aborted);
        assert_eq!(outcome.request_id(), "abc");
    }

    #[tokio::test]
    async fn upstream_error_mid_stream_ends_with_envelope() {
        let upstream = ScriptedUpstream::new(vec![
            Step::Fragment("par".into()),
            Step::Fail(UpstreamError::Provider("model overloaded".into())),
            Step::Fragment("never".into()),
        ]);
        let mut channel = RecordingChannel::new();

        let outcome = relay(&upstream).handle(&mut channel, HI).await;

        let sent = channel.sent_outbound();
        assert_eq!(sent.len(), 2);
        assert_eq!(chunk(&sent[0]).content, "par");
        assert_eq!(envelope(&sent[1]), &ErrorEnvelope::new("t1", "model overloaded"));
        assert!(sent.iter().all(|m| !matches!(m, Outbound::Chunk(c) if c.finished)));
        assert_eq!(outcome.forwarded(), 1);
        assert!(matches!(
            outcome,
            RelayOutcome::Aborted {
                reason: AbortReason::Upstream(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn open_failure_sends_provider_message() {
        let mut upstream = MockGenerationPort::new();
        upstream.expect_open_stream().times(1).returning(|_| {
            Err(UpstreamError::Rejected {
                status: 401,
                message: "Incorrect API key provided".into(),
            })
        });
        let relay = Relay::new(Arc::new(upstream));
        let mut channel = RecordingChannel::new();

        let outcome = relay.handle(&mut channel, HI).await;

        let sent = channel.sent_outbound();
        assert_eq!(
            sent,
            vec![Outbound::from(ErrorEnvelope::new(
                "t1",
                "Incorrect API key provided"
            ))]
        );
        assert_eq!(outcome.forwarded(), 0);
        assert_eq!(outcome.phase(), Phase::Aborted);
    }

    #[tokio::test]
    async fn upstream_error_after_client_left_counts_as_disconnect() {
        let upstream = ScriptedUpstream::new(vec![
            Step::Fragment("par".into()),
            Step::Fail(UpstreamError::Provider("model overloaded".into())),
        ]);
        let mut channel = RecordingChannel::new().reject_sends_after(1);

        let outcome = relay(&upstream).handle(&mut channel, HI).await;

        assert_eq!(channel.sent().len(), 1);
        assert_eq!(
            outcome,
            RelayOutcome::Aborted {
                request_id: "t1".into(),
                forwarded: 1,
                reason: AbortReason::Disconnected,
            }
        );
    }

    #[tokio::test]
    async fn open_failure_after_client_left_counts_as_disconnect() {
        let upstream = ScriptedUpstream::failing_open(UpstreamError::Transport("refused".into()));
        let mut channel = RecordingChannel::new().reject_sends_after(0);

        let outcome = relay(&upstream).handle(&mut channel, HI).await;

        assert!(channel.sent().is_empty());
        assert!(matches!(
            outcome,
            RelayOutcome::Aborted {
                reason: AbortReason::Disconnected,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn disconnect_mid_stream_stops_consuming_upstream() {
        let upstream = ScriptedUpstream::fragments(["one", "two", "three"]);
        let mut channel = RecordingChannel::new().close_after_sends(1);

        let outcome = relay(&upstream).handle(&mut channel, HI).await;

        let sent = channel.sent_outbound();
        assert_eq!(sent, vec![Outbound::from(Chunk::fragment("t1", "one"))]);
        assert_eq!(upstream.yielded(), 1);
        assert_eq!(
            outcome,
            RelayOutcome::Aborted {
                request_id: "t1".into(),
                forwarded: 1,
                reason: AbortReason::Disconnected,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn close_while_waiting_for_fragment_aborts() {
        let upstream = ScriptedUpstream::new(vec![Step::Fragment("a".into()), Step::Hang]);
        let mut channel = RecordingChannel::new();
        let close = channel.close_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            close.cancel();
        });

        let outcome = relay(&upstream).handle(&mut channel, HI).await;

        assert_eq!(channel.sent().len(), 1);
        assert_eq!(outcome.forwarded(), 1);
        assert!(matches!(
            outcome,
            RelayOutcome::Aborted {
                reason: AbortReason::Disconnected,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn close_while_opening_aborts_silently() {
        let upstream = ScriptedUpstream::hanging_open();
        let mut channel = RecordingChannel::new();
        let close = channel.close_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            close.cancel();
        });

        let outcome = relay(&upstream).handle(&mut channel, HI).await;

        assert!(channel.sent().is_empty());
        assert_eq!(outcome.phase(), Phase::Aborted);
        assert_eq!(upstream.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_send_mid_stream_aborts_without_error() {
        let upstream = ScriptedUpstream::fragments(["one", "two", "three"]);
        let mut channel = RecordingChannel::new().reject_sends_after(1);

        let outcome = relay(&upstream).handle(&mut channel, HI).await;

        assert_eq!(channel.sent().len(), 1);
        assert_eq!(upstream.yielded(), 2);
        assert_eq!(outcome.forwarded(), 1);
        assert!(matches!(
            outcome,
            RelayOutcome::Aborted {
                reason: AbortReason::Disconnected,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn finished_chunk_is_suppressed_after_close() {
        let upstream = ScriptedUpstream::fragments(["only"]);
        let mut channel = RecordingChannel::new().reject_sends_after(1);

        let outcome = relay(&upstream).handle(&mut channel, HI).await;

        assert_eq!(channel.sent().len(), 1);
        let RelayOutcome::Completed {
            delivered,
            forwarded,
            metrics,
            ..
        } = outcome
        else {
            panic!("expected completion, got {outcome:?}");
        };
        assert!(!delivered);
        assert_eq!(forwarded, 1);
        assert_eq!(metrics.length, 4);
    }

    #[test]
    fn phase_transitions_follow_lifecycle() {
        use Phase::{Aborted, Done, Finalizing, Idle, Streaming, Validating};

        assert!(Idle.can_advance_to(Validating));
        assert!(Validating.can_advance_to(Streaming));
        assert!(Validating.can_advance_to(Aborted));
        assert!(Streaming.can_advance_to(Finalizing));
        assert!(Streaming.can_advance_to(Aborted));
        assert!(Finalizing.can_advance_to(Done));

        assert!(!Finalizing.can_advance_to(Aborted));
        assert!(!Idle.can_advance_to(Streaming));
        assert!(!Done.can_advance_to(Aborted));
        assert!(!Aborted.can_advance_to(Done));
        assert!(Done.is_terminal() && Aborted.is_terminal());
        assert!(!Streaming.is_terminal());
    }
}
