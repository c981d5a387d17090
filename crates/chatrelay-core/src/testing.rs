//! In-memory port implementations for tests.
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for adapter crates that want to drive the relay without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use tokio_util::sync::CancellationToken;

use crate::domain::Outbound;
use crate::ports::{
    ClientChannel, ConnectionClosed, FragmentStream, GenerationParams, GenerationPort,
    UpstreamError,
};

/// One scripted upstream event.
#[derive(Debug, Clone)]
pub enum Step {
    /// Yield a fragment.
    Fragment(String),
    /// Yield an error; the stream ends afterwards.
    Fail(UpstreamError),
    /// Pause before the next step.
    Delay(Duration),
    /// Never produce anything again.
    Hang,
}

#[derive(Debug, Clone)]
enum OpenBehavior {
    Ready,
    Fail(UpstreamError),
    Hang,
}

/// A [`GenerationPort`] that replays a fixed script on every call.
#[derive(Debug, Clone)]
pub struct ScriptedUpstream {
    steps: Vec<Step>,
    open: OpenBehavior,
    calls: Arc<Mutex<Vec<GenerationParams>>>,
    yielded: Arc<AtomicUsize>,
}

impl ScriptedUpstream {
    #[must_use]
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            open: OpenBehavior::Ready,
            calls: Arc::default(),
            yielded: Arc::default(),
        }
    }

    /// Script that yields the given fragments and then ends.
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            fragments
                .into_iter()
                .map(|f| Step::Fragment(f.into()))
                .collect(),
        )
    }

    /// Upstream that refuses to open a stream.
    #[must_use]
    pub fn failing_open(error: UpstreamError) -> Self {
        Self {
            open: OpenBehavior::Fail(error),
            ..Self::new(Vec::new())
        }
    }

    /// Upstream whose `open_stream` never resolves.
    #[must_use]
    pub fn hanging_open() -> Self {
        Self {
            open: OpenBehavior::Hang,
            ..Self::new(Vec::new())
        }
    }

    /// Parameters of every `open_stream` call so far.
    #[must_use]
    pub fn calls(&self) -> Vec<GenerationParams> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of fragments pulled from all streams so far.
    #[must_use]
    pub fn yielded(&self) -> usize {
        self.yielded.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationPort for ScriptedUpstream {
    async fn open_stream(&self, params: GenerationParams) -> Result<FragmentStream, UpstreamError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(params);
        }

        match &self.open {
            OpenBehavior::Ready => {}
            OpenBehavior::Fail(e) => return Err(e.clone()),
            OpenBehavior::Hang => std::future::pending::<()>().await,
        }

        let state = (self.steps.clone().into_iter(), Arc::clone(&self.yielded));
        let fragments = stream::unfold(state, |(mut steps, yielded)| async move {
            loop {
                match steps.next()? {
                    Step::Fragment(fragment) => {
                        yielded.fetch_add(1, Ordering::SeqCst);
                        return Some((Ok(fragment), (steps, yielded)));
                    }
                    Step::Fail(e) => return Some((Err(e), (Vec::new().into_iter(), yielded))),
                    Step::Delay(d) => tokio::time::sleep(d).await,
                    Step::Hang => std::future::pending::<()>().await,
                }
            }
        });

        Ok(Box::pin(fragments))
    }
}

/// A [`ClientChannel`] backed by an inbound queue and a record of sends.
///
/// `recv` closes the channel once the queue is exhausted, like a peer that
/// sends its requests and then hangs up.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    inbound: VecDeque<String>,
    sent: Vec<String>,
    close_after_sends: Option<usize>,
    reject_sends_after: Option<usize>,
    closed: CancellationToken,
}

impl RecordingChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel whose peer sends the given messages in order.
    pub fn with_inbound<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inbound: messages.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Close the channel right after the `n`th successful send.
    #[must_use]
    pub const fn close_after_sends(mut self, n: usize) -> Self {
        self.close_after_sends = Some(n);
        self
    }

    /// Fail every send after the `n`th without signalling `closed`.
    ///
    /// Models a write side that breaks before the read side notices.
    #[must_use]
    pub const fn reject_sends_after(mut self, n: usize) -> Self {
        self.reject_sends_after = Some(n);
        self
    }

    /// Token that closes the channel when cancelled.
    #[must_use]
    pub fn close_handle(&self) -> CancellationToken {
        self.closed.clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Raw text of every message sent so far.
    #[must_use]
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Sent messages parsed back into [`Outbound`].
    ///
    /// # Panics
    ///
    /// Panics if a sent message is not a valid outbound message.
    #[must_use]
    pub fn sent_outbound(&self) -> Vec<Outbound> {
        self.sent
            .iter()
            .map(|text| {
                serde_json::from_str(text)
                    .unwrap_or_else(|e| panic!("sent message is not outbound JSON: {e}: {text}"))
            })
            .collect()
    }
}

#[async_trait]
impl ClientChannel for RecordingChannel {
    async fn recv(&mut self) -> Result<String, ConnectionClosed> {
        if self.closed.is_cancelled() {
            return Err(ConnectionClosed);
        }
        self.inbound.pop_front().ok_or_else(|| {
            self.closed.cancel();
            ConnectionClosed
        })
    }

    async fn send(&mut self, text: String) -> Result<(), ConnectionClosed> {
        if self.closed.is_cancelled() || self.reject_sends_after == Some(self.sent.len()) {
            return Err(ConnectionClosed);
        }
        self.sent.push(text);
        if self.close_after_sends == Some(self.sent.len()) {
            self.closed.cancel();
        }
        Ok(())
    }

    async fn closed(&self) {
        self.closed.cancelled().await;
    }
}
