use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;

use crate::error::CheckError;
use crate::http::HttpBodyStream;

/// Receives each non-empty text delta in arrival order; the flag is `true` exactly once,
/// for the first delta of the call.
pub type ChunkCallback<'a> = &'a mut (dyn FnMut(&str, bool) + Send);

/// Pulls zero or more text deltas out of one `data:` payload.
///
/// An `Err` means the payload was not valid JSON for the protocol; the driver skips it.
pub(crate) type DeltaExtractor = fn(&str) -> Result<Vec<String>, serde_json::Error>;

/// Standardized SSE line yielded by [`StreamDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Payload of one `data:` line.
    Data(String),
    /// Terminal marker reported via `[DONE]`.
    Done,
}

/// Splits a raw body stream into `data:` lines without buffering the whole body.
///
/// Lines are cut on `\n` (a trailing `\r` is dropped), so a payload split across
/// network chunks is reassembled before it is yielded. Lines that are not `data:`
/// lines, including `event:` and comments, are ignored. A read error is yielded once
/// and ends the stream.
pub struct StreamDecoder {
    body: HttpBodyStream,
    buffer: Vec<u8>,
    pending: VecDeque<StreamEvent>,
    provider: &'static str,
    stream_closed: bool,
}

impl StreamDecoder {
    /// Wraps a raw HTTP body stream and prepares it for line decoding.
    pub fn new(body: HttpBodyStream, provider: &'static str) -> Self {
        Self {
            body,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            provider,
            stream_closed: false,
        }
    }

    fn handle_line(&mut self, line: &[u8]) {
        let Ok(line) = std::str::from_utf8(line) else {
            tracing::debug!(provider = self.provider, "skipping non UTF-8 stream line");
            return;
        };
        let Some(payload) = line.trim().strip_prefix("data:") else {
            return;
        };
        let payload = payload.trim_start();
        if payload.is_empty() {
            return;
        }
        if payload == "[DONE]" {
            self.pending.push_back(StreamEvent::Done);
        } else {
            self.pending.push_back(StreamEvent::Data(payload.to_string()));
        }
    }

    fn drain_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
        buffer.iter().position(|b| *b == b'\n').map(|pos| {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line
        })
    }
}

impl Stream for StreamDecoder {
    type Item = Result<StreamEvent, CheckError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.stream_closed {
                return Poll::Ready(None);
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                    while let Some(line) = Self::drain_line(&mut this.buffer) {
                        this.handle_line(&line);
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    this.stream_closed = true;
                    this.buffer.clear();
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.stream_closed = true;
                    if !this.buffer.is_empty() {
                        let line = std::mem::take(&mut this.buffer);
                        this.handle_line(&line);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Drives a [`StreamDecoder`] to EOF, accumulating every delta the extractor finds.
///
/// Malformed payloads are skipped and `[DONE]` markers ignored. A read error stops
/// decoding but the text gathered so far is still returned.
pub(crate) async fn decode_text_stream(
    body: HttpBodyStream,
    provider: &'static str,
    extract: DeltaExtractor,
    on_chunk: ChunkCallback<'_>,
) -> String {
    let mut decoder = StreamDecoder::new(body, provider);
    let mut content = String::new();
    let mut is_first = true;

    while let Some(event) = decoder.next().await {
        let data = match event {
            Ok(StreamEvent::Data(data)) => data,
            Ok(StreamEvent::Done) => continue,
            Err(err) => {
                tracing::warn!(provider, error = %err, "stream read failed, keeping partial output");
                break;
            }
        };
        let deltas = match extract(&data) {
            Ok(deltas) => deltas,
            Err(err) => {
                tracing::debug!(provider, error = %err, "skipping malformed stream event");
                continue;
            }
        };
        for delta in deltas.iter().filter(|delta| !delta.is_empty()) {
            content.push_str(delta);
            on_chunk(delta.as_str(), is_first);
            is_first = false;
        }
    }

    content
}
