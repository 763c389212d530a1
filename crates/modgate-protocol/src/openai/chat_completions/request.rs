use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};

use crate::openai::chat_completions::types::{ChatMessage, NormalizedMessage, ResponseFormat};

/// Inbound chat-completion call as received from the caller.
///
/// Only the fields the gate relays are modeled; anything else on the wire is
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Numbers are kept as received so `1` is not re-emitted as `1.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<Number>,
    /// Opaque; forwarded only when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<JsonValue>,
    /// Opaque; forwarded only when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<JsonValue>,
}

impl ChatCompletionRequest {
    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// Body sent to the moderation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationRequestBody {
    pub messages: Vec<NormalizedMessage>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: i64,
    pub response_format: ResponseFormat,
}

/// Body sent to the relay provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRequestBody {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Number>,
    pub max_tokens: Number,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<JsonValue>,
}
