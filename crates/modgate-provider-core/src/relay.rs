use serde_json::{Number, Value as JsonValue, json};

use modgate_common::ProviderConfig;
use modgate_protocol::openai::types::{ChatCompletionRequest, MessageContent, RelayRequestBody};

use crate::errors::GateResult;
use crate::upstream::UpstreamHttpRequest;

pub const DEFAULT_RELAY_MAX_TOKENS: i64 = 2000;

/// Builds the relay body from the caller's original request.
///
/// Messages are the caller's own, including parts the moderation pass never
/// looked at. `response_format` and `tools` are omitted (not nulled) when the
/// caller did not send them.
pub fn build_relay_body(request: &ChatCompletionRequest) -> RelayRequestBody {
    RelayRequestBody {
        model: request.model.clone(),
        messages: request.messages.clone(),
        stream: request.is_stream(),
        temperature: request.temperature.clone(),
        max_tokens: request
            .max_tokens
            .clone()
            .unwrap_or_else(|| Number::from(DEFAULT_RELAY_MAX_TOKENS)),
        response_format: request.response_format.clone(),
        tools: request.tools.clone(),
    }
}

/// Streamed when the caller asked for a stream, buffered otherwise.
pub fn build_relay_request(
    provider: &ProviderConfig,
    request: &ChatCompletionRequest,
) -> GateResult<UpstreamHttpRequest> {
    let body = build_relay_body(request);
    UpstreamHttpRequest::json_post(provider, &body, body.stream)
}

/// Loggable view of a relay body: multi-part content is not written out.
pub fn relay_log_summary(body: &RelayRequestBody) -> JsonValue {
    let messages = body
        .messages
        .iter()
        .map(|message| {
            let content = match &message.content {
                MessageContent::Parts(_) => JsonValue::from("Array content (not displayed)"),
                MessageContent::Text(text) => JsonValue::from(text.as_str()),
                MessageContent::Null | MessageContent::Absent => JsonValue::Null,
            };
            json!({"role": message.role, "content": content})
        })
        .collect::<Vec<_>>();
    json!({
        "model": body.model,
        "stream": body.stream,
        "temperature": body.temperature,
        "max_tokens": body.max_tokens,
        "has_response_format": body.response_format.is_some(),
        "has_tools": body.tools.is_some(),
        "messages": messages,
    })
}
