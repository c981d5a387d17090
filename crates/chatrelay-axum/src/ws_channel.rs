//! [`ClientChannel`] over an axum WebSocket.
//!
//! The socket is split: an ingest task reads frames and queues text
//! messages, while the relay writes through the sink half. The ingest task
//! trips a [`CancellationToken`] when the peer goes away, so the relay sees
//! disconnection at its next suspension point even while it is busy
//! streaming.

use std::collections::VecDeque;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use chatrelay_core::{ClientChannel, ConnectionClosed};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Inbound text frames buffered ahead of the session loop.
const INBOUND_CAPACITY: usize = 64;

/// Frames held by the reader once the queue is full.
const BACKLOG_LIMIT: usize = 64;

pub struct WsChannel {
    sink: SplitSink<WebSocket, Message>,
    inbound: mpsc::Receiver<String>,
    closed: CancellationToken,
    ingest: JoinHandle<()>,
}

impl WsChannel {
    pub fn new(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        let (tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
        let closed = CancellationToken::new();
        let ingest = tokio::spawn(ingest(stream, tx, closed.clone()));

        Self {
            sink,
            inbound,
            closed,
            ingest,
        }
    }
}

async fn ingest(
    mut stream: SplitStream<WebSocket>,
    tx: mpsc::Sender<String>,
    closed: CancellationToken,
) {
    // Frames read while the queue is full. The socket keeps being read so a
    // close is seen even when the session is behind.
    let mut backlog: VecDeque<String> = VecDeque::new();

    loop {
        tokio::select! {
            permit = tx.reserve(), if !backlog.is_empty() => {
                let Ok(permit) = permit else { break };
                if let Some(text) = backlog.pop_front() {
                    permit.send(text);
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if backlog.len() >= BACKLOG_LIMIT {
                        warn!(
                            pending = INBOUND_CAPACITY + backlog.len(),
                            "Too many unanswered requests, dropping connection"
                        );
                        break;
                    }
                    backlog.push_back(text.as_str().to_owned());
                }
                Some(Ok(Message::Binary(data))) => {
                    warn!(len = data.len(), "Ignoring binary WebSocket frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket close frame received");
                    break;
                }
                // Pong replies are queued by the transport itself.
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Err(e)) => {
                    debug!("WebSocket read error: {e}");
                    break;
                }
                None => break,
            },
        }
    }
    closed.cancel();
}

#[async_trait]
impl ClientChannel for WsChannel {
    async fn recv(&mut self) -> Result<String, ConnectionClosed> {
        // Messages queued before the close are still delivered.
        self.inbound.recv().await.ok_or(ConnectionClosed)
    }

    async fn send(&mut self, text: String) -> Result<(), ConnectionClosed> {
        if self.closed.is_cancelled() {
            return Err(ConnectionClosed);
        }
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| {
                debug!("WebSocket send failed: {e}");
                self.closed.cancel();
                ConnectionClosed
            })
    }

    async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.ingest.abort();
    }
}
