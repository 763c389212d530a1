use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use axum::response::Response;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use modgate_protocol::openai::types::ChatCompletionRequest;
use modgate_protocol::sse;
use modgate_provider_core::GateError;

use crate::core::CoreState;
use crate::gate::RelayOutcome;
use crate::transport::{
    REQUEST_ID_HEADER, SseSink, error_response, json_response, pipe_relay_stream, sse_response,
};

pub async fn completions_handler(
    State(state): State<Arc<CoreState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let trace_id = Uuid::new_v4().to_string();
    let mut response = handle(state, method, &headers, body, &trace_id).await;
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

async fn handle(
    state: Arc<CoreState>,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
    trace_id: &str,
) -> Response {
    let started_at = Instant::now();

    // Everything up to parsing answers as JSON, whatever the caller asked for.
    if method != Method::POST {
        return error_response(&GateError::method_not_allowed(), trace_id);
    }
    if let Err(err) = state.auth.authenticate(headers) {
        return error_response(&err, trace_id);
    }
    let request = match serde_json::from_slice::<ChatCompletionRequest>(&body) {
        Ok(request) => request,
        Err(err) => {
            let err = GateError::invalid_request(format!("Invalid request body: {err}"));
            return error_response(&err, trace_id);
        }
    };

    let is_stream = request.is_stream();
    info!(
        event = "downstream_received",
        trace_id = %trace_id,
        model = %request.model,
        is_stream,
        messages = request.messages.len(),
    );

    if is_stream {
        let (sink, response) = sse_response(trace_id);
        let trace_id = trace_id.to_string();
        tokio::spawn(async move {
            stream_gate(state, request, sink, &trace_id).await;
            info!(
                event = "downstream_responded",
                trace_id = %trace_id,
                status = 200,
                elapsed_ms = started_at.elapsed().as_millis(),
                is_stream = true,
            );
        });
        return response;
    }

    let response = match state.engine.run(&request, trace_id).await {
        Ok(RelayOutcome::Json(value)) => json_response(200, &value),
        Ok(RelayOutcome::Stream(_)) => error_response(
            &GateError::Internal {
                message: "relay streamed a buffered request".to_string(),
                status: None,
            },
            trace_id,
        ),
        Err(err) => error_response(&err, trace_id),
    };
    info!(
        event = "downstream_responded",
        trace_id = %trace_id,
        status = response.status().as_u16(),
        elapsed_ms = started_at.elapsed().as_millis(),
        is_stream = false,
    );
    response
}

/// Headers are already out; every outcome from here on is written as frames.
async fn stream_gate(
    state: Arc<CoreState>,
    request: ChatCompletionRequest,
    mut sink: SseSink,
    trace_id: &str,
) {
    match state.engine.run(&request, trace_id).await {
        Ok(RelayOutcome::Stream(upstream)) => {
            pipe_relay_stream(&mut sink, upstream).await;
        }
        Ok(RelayOutcome::Json(value)) => {
            warn!(
                event = "relay_buffered_in_stream",
                trace_id = %trace_id,
            );
            if sink.send(sse::encode_data(&value.to_string())).await {
                sink.send(sse::done_frame()).await;
            }
        }
        Err(err) => sink.send_error(&err).await,
    }
}
