//! Server-Sent Events to fragment stream adapter.
//!
//! The provider streams `data: {json}\n\n` events terminated by
//! `data: [DONE]`. This module turns the raw response body into the lazy
//! fragment sequence the relay consumes.

use std::fmt::Display;

use bytes::{Bytes, BytesMut};
use chatrelay_core::{FragmentStream, UpstreamError};
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::models::ChatCompletionChunk;

/// Message used when the provider reports an error without text.
const UNSPECIFIED_PROVIDER_ERROR: &str = "Upstream provider reported an error";

/// State threaded through the `unfold` stream.
struct SseState<E> {
    stream: BoxStream<'static, Result<Bytes, E>>,
    buf: BytesMut,
    /// Body fully read; only buffered lines remain.
    eof: bool,
    /// `[DONE]` seen or an error emitted; nothing more is produced.
    done: bool,
}

/// What one SSE line means for the fragment sequence.
#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Skip,
    Done,
    Fragment(String),
    Error(UpstreamError),
}

/// Convert an SSE response body into a fragment stream.
///
/// Ends on `[DONE]` or end of body. A body read failure yields one
/// [`UpstreamError::Transport`] and ends the stream.
pub fn fragment_stream<S, E>(byte_stream: S) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = SseState {
        stream: byte_stream.boxed(),
        buf: BytesMut::new(),
        eof: false,
        done: false,
    };

    let fragments = stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }

        loop {
            if let Some(line_end) = find_newline(&st.buf) {
                let line = st.buf.split_to(line_end);
                match parse_line(&String::from_utf8_lossy(&line)) {
                    SseLine::Skip => continue,
                    SseLine::Done => {
                        debug!("Upstream stream finished");
                        return None;
                    }
                    SseLine::Fragment(fragment) => return Some((Ok(fragment), st)),
                    SseLine::Error(e) => {
                        st.done = true;
                        return Some((Err(e), st));
                    }
                }
            }

            if st.eof {
                return None;
            }

            match st.stream.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    warn!("Upstream stream error: {e}");
                    st.done = true;
                    return Some((Err(UpstreamError::Transport(e.to_string())), st));
                }
                None => {
                    // Flush a final line that lacks its terminator.
                    st.eof = true;
                    if st.buf.is_empty() {
                        return None;
                    }
                    st.buf.extend_from_slice(b"\n");
                }
            }
        }
    });

    Box::pin(fragments)
}

fn parse_line(line: &str) -> SseLine {
    let trimmed = line.trim();

    // Blank lines separate events; `:` starts a comment.
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return SseLine::Skip;
    }

    let Some(data) = trimmed.strip_prefix("data:") else {
        // `event:`, `id:` and `retry:` fields carry nothing we need.
        return SseLine::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => match chunk.error {
            Some(err) if err.message.is_empty() => {
                SseLine::Error(UpstreamError::Provider(UNSPECIFIED_PROVIDER_ERROR.to_string()))
            }
            Some(err) => SseLine::Error(UpstreamError::Provider(err.message)),
            None => SseLine::Fragment(chunk.content().to_string()),
        },
        Err(e) => {
            warn!("Skipping unparseable SSE payload: {e}");
            SseLine::Skip
        }
    }
}

fn find_newline(buf: &BytesMut) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}
