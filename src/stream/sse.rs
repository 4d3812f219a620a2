use async_trait::async_trait;
use futures_util::{Stream, StreamExt, stream};
use reqwest::header::ACCEPT;
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::debug;
use url::Url;

use crate::error::TransportError;
use crate::metrics::Sample;

use super::transport::{LiveStream, LiveTransport};
use super::wire::parse_sample_json;

const EVENT_STREAM: &str = "text/event-stream";
const EVENT_SEPARATOR: &[u8] = b"\n\n";
const DATA_FIELD: &str = "data:";

/// Largest event accepted; a longer one is dropped up to its terminator.
pub(crate) const MAX_EVENT_BYTES: usize = 64 * 1024;

/// Incremental Server-Sent Events parser.
///
/// Bytes are fed in arbitrary chunks; every completed event yields the
/// concatenation of its `data:` lines. Comment lines and other fields are
/// skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes before this offset are known not to start a separator.
    scanned: usize,
    /// Set while skipping the rest of an oversized event.
    discarding: bool,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut payloads = Vec::new();
        let mut start = 0usize;
        loop {
            let from = self.scanned.max(start);
            let Some(offset) = self
                .buffer
                .get(from..)
                .and_then(find_separator)
            else {
                break;
            };
            let end = from.saturating_add(offset);
            if self.discarding {
                self.discarding = false;
            } else if let Some(payload) = self.buffer.get(start..end).and_then(event_data) {
                payloads.push(payload);
            }
            start = end.saturating_add(EVENT_SEPARATOR.len());
            self.scanned = start;
        }
        self.buffer.drain(..start.min(self.buffer.len()));
        self.scanned = self
            .buffer
            .len()
            .saturating_sub(EVENT_SEPARATOR.len().saturating_sub(1));

        if self.buffer.len() > MAX_EVENT_BYTES {
            if !self.discarding {
                debug!(
                    "Dropping SSE event larger than {} bytes",
                    MAX_EVENT_BYTES
                );
            }
            self.discarding = true;
            // Keep the tail so a separator split across chunks is still seen.
            let keep_from = self.buffer.len().saturating_sub(1);
            self.buffer.drain(..keep_from);
            self.scanned = 0;
        }
        payloads
    }

    #[cfg(test)]
    pub(crate) fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

fn find_separator(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(EVENT_SEPARATOR.len())
        .position(|window| window == EVENT_SEPARATOR)
}

fn event_data(event: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(event);
    let data: Vec<&str> = text
        .lines()
        .filter(|line| !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix(DATA_FIELD))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();
    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

struct SseState<S> {
    inner: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Sample>,
    finished: bool,
}

/// Turns a byte stream of SSE frames into a [`LiveStream`].
///
/// Malformed frames are logged and skipped. A read error is passed through
/// once and the end of input surfaces as `StreamEnded`; nothing follows
/// either.
pub fn decode_sse_stream<S, B>(bytes: S) -> LiveStream
where
    S: Stream<Item = Result<B, TransportError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        inner: Box::pin(bytes),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };
    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(sample) = state.pending.pop_front() {
                return Some((Ok(sample), state));
            }
            if state.finished {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    for payload in state.decoder.push(chunk.as_ref()) {
                        match parse_sample_json(&payload) {
                            Ok(sample) => state.pending.push_back(sample),
                            Err(err) => debug!("Dropping live frame: {}", err),
                        }
                    }
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    return Some((Err(TransportError::StreamEnded), state));
                }
            }
        }
    }))
}

/// Live transport reading `GET {server}/api/stream/samples`.
pub struct SseLiveTransport {
    client: reqwest::Client,
    url: Url,
}

impl SseLiveTransport {
    #[must_use]
    pub const fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl LiveTransport for SseLiveTransport {
    async fn connect(&self) -> Result<LiveStream, TransportError> {
        let response = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, EVENT_STREAM)
            .send()
            .await
            .map_err(|err| TransportError::Request {
                url: self.url.to_string(),
                source: err,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: self.url.to_string(),
                status: status.as_u16(),
            });
        }
        debug!("Live stream connected to {}", self.url);
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| TransportError::StreamRead { source: err }));
        Ok(decode_sse_stream(bytes))
    }
}
