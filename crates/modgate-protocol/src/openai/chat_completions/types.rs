use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "developer")]
    Developer,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "tool")]
    Tool,
    #[serde(rename = "function")]
    Function,
    #[serde(untagged)]
    Other(String),
}

/// One element of a multi-part message content list.
///
/// Only `type == "text"` parts carry moderation-relevant text. Every other
/// field (`image_url`, `input_audio`, `file`, ...) is kept opaque so the part
/// can be relayed unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl ContentPart {
    pub fn is_text(&self) -> bool {
        self.r#type == "text"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    /// Explicit `null`, e.g. an assistant turn that only carries tool calls.
    Null,
    /// The field was not present on the wire; never serialized.
    #[default]
    #[serde(skip)]
    Absent,
}

impl MessageContent {
    pub fn is_absent(&self) -> bool {
        matches!(self, MessageContent::Absent)
    }
}

/// A caller message, kept in a shape that re-serializes to what was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "MessageContent::is_absent")]
    pub content: MessageContent,
    /// Fields the gate does not interpret (`name`, `tool_calls`, `tool_call_id`, ...).
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl ChatMessage {
    pub fn new(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            content,
            extra: Map::new(),
        }
    }
}

/// Flat-text message as submitted to the moderation provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub role: Role,
    pub content: String,
}

impl NormalizedMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonObject,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_shapes_deserialize() {
        let text: ChatMessage =
            serde_json::from_value(json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(text.content, MessageContent::Text("hi".to_string()));

        let parts: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "image_url", "image_url": {"url": "https://x/y.png"}},
                {"type": "text", "text": "a"}
            ]
        }))
        .unwrap();
        let MessageContent::Parts(parts) = parts.content else {
            panic!("expected parts");
        };
        assert!(!parts[0].is_text());
        assert!(parts[0].extra.contains_key("image_url"));
        assert_eq!(parts[1].text.as_deref(), Some("a"));

        let null: ChatMessage =
            serde_json::from_value(json!({"role": "assistant", "content": null})).unwrap();
        assert_eq!(null.content, MessageContent::Null);

        let absent: ChatMessage =
            serde_json::from_value(json!({"role": "assistant", "tool_calls": []})).unwrap();
        assert!(absent.content.is_absent());
    }

    #[test]
    fn message_reserializes_unchanged() {
        let inputs = [
            json!({"role": "user", "content": "hello", "name": "bob"}),
            json!({"role": "assistant", "content": null, "tool_calls": [{"id": "c1"}]}),
            json!({"role": "tool", "tool_call_id": "c1"}),
            json!({
                "role": "critic",
                "content": [{"type": "input_audio", "input_audio": {"data": "AA=="}}]
            }),
        ];
        for input in inputs {
            let message: ChatMessage = serde_json::from_value(input.clone()).unwrap();
            assert_eq!(serde_json::to_value(&message).unwrap(), input);
        }
    }

    #[test]
    fn unknown_role_is_kept() {
        let message: ChatMessage =
            serde_json::from_value(json!({"role": "critic", "content": "x"})).unwrap();
        assert_eq!(message.role, Role::Other("critic".to_string()));
    }
}
