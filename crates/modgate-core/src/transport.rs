//! Response Transport Adapter: turns gate outcomes into buffered JSON or an
//! SSE body, in whichever mode the caller asked for.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use modgate_protocol::sse::{self, SseParser};
use modgate_provider_core::{ByteStream, GateError, NormalizedError, normalize_error};

pub const REQUEST_ID_HEADER: &str = "x-modgate-request-id";

const SSE_CHANNEL_CAPACITY: usize = 32;

pub fn json_response<T: Serialize>(status: u16, body: &T) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match serde_json::to_vec(body) {
        Ok(bytes) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .unwrap_or_else(|_| build_failed()),
        Err(_) => build_failed(),
    }
}

/// Buffered error reply: the envelope with its resolved status.
pub fn error_response(err: &GateError, trace_id: &str) -> Response {
    let normalized = log_normalized(err, trace_id);
    json_response(normalized.status, &normalized.envelope)
}

fn log_normalized(err: &GateError, trace_id: &str) -> NormalizedError {
    let normalized = normalize_error(err);
    warn!(
        event = "gate_error",
        trace_id = %trace_id,
        status = normalized.status,
        code = ?normalized.envelope.error.code,
        error = %err,
    );
    normalized
}

fn build_failed() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "response_build_failed").into_response()
}

/// Write side of a live event stream. Writes after the caller went away are
/// dropped with a warning; the sink never raises a second error for them.
pub struct SseSink {
    tx: mpsc::Sender<Bytes>,
    trace_id: String,
    closed: bool,
}

impl SseSink {
    pub async fn send(&mut self, chunk: Bytes) -> bool {
        if self.closed {
            return false;
        }
        if self.tx.send(chunk).await.is_err() {
            self.closed = true;
            warn!(
                event = "downstream_disconnected",
                trace_id = %self.trace_id,
            );
            return false;
        }
        true
    }

    /// One error frame then the terminator. The stream ends when the sink drops.
    pub async fn send_error(&mut self, err: &GateError) {
        let normalized = log_normalized(err, &self.trace_id);
        let frame = match serde_json::to_string(&normalized.envelope) {
            Ok(json) => sse::encode_data(&json),
            Err(_) => return,
        };
        if self.send(frame).await {
            self.send(sse::done_frame()).await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Opens the event stream. The returned response carries the headers right
/// away; bytes follow as they are pushed into the sink.
pub fn sse_response(trace_id: &str) -> (SseSink, Response) {
    let (tx, rx) = mpsc::channel::<Bytes>(SSE_CHANNEL_CAPACITY);
    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(sse::CONTENT_TYPE));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    // Hint reverse proxies not to buffer the stream.
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );

    let sink = SseSink {
        tx,
        trace_id: trace_id.to_string(),
        closed: false,
    };
    (sink, response)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub chunks: usize,
    pub bytes: usize,
    pub saw_done: bool,
}

/// Forwards the relay stream verbatim. The parser only watches for `[DONE]`.
pub async fn pipe_relay_stream(sink: &mut SseSink, mut upstream: ByteStream) -> StreamStats {
    let mut stats = StreamStats::default();
    let mut parser = SseParser::new();

    while let Some(item) = upstream.recv().await {
        match item {
            Ok(chunk) => {
                stats.chunks += 1;
                stats.bytes += chunk.len();
                if !stats.saw_done {
                    stats.saw_done = parser.push_bytes(&chunk).iter().any(|ev| ev.is_done());
                }
                if !sink.send(chunk).await {
                    break;
                }
            }
            Err(failure) => {
                sink.send_error(&GateError::Upstream(failure)).await;
                break;
            }
        }
    }
    if !stats.saw_done {
        stats.saw_done = parser.finish().iter().any(|ev| ev.is_done());
    }

    info!(
        event = "relay_stream_finished",
        trace_id = %sink.trace_id,
        chunks = stats.chunks,
        bytes = stats.bytes,
        saw_done = stats.saw_done,
        caller_gone = sink.is_closed(),
    );
    stats
}
