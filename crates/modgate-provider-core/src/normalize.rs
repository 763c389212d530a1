use serde_json::Value as JsonValue;

use modgate_protocol::openai::types::{ChatMessage, ContentPart, MessageContent, NormalizedMessage};

/// How a message's content is flattened for moderation, resolved once per message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentShape<'a> {
    FlatText(&'a str),
    PartList(&'a [ContentPart]),
    /// A string that parsed as a JSON object or array.
    JsonString(JsonValue),
    Empty,
}

impl<'a> ContentShape<'a> {
    pub fn of(content: &'a MessageContent) -> Self {
        match content {
            MessageContent::Parts(parts) => ContentShape::PartList(parts),
            MessageContent::Text(text) => {
                if (text.starts_with('{') || text.starts_with('['))
                    && let Ok(value) = serde_json::from_str::<JsonValue>(text)
                {
                    return ContentShape::JsonString(value);
                }
                ContentShape::FlatText(text)
            }
            MessageContent::Null | MessageContent::Absent => ContentShape::Empty,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ContentShape::FlatText(text) => text.to_string(),
            // Image, audio and file parts are not moderated; they are still relayed.
            ContentShape::PartList(parts) => parts
                .iter()
                .filter(|part| part.is_text())
                .map(|part| part.text.as_deref().unwrap_or(""))
                .collect::<Vec<_>>()
                .join("\n"),
            ContentShape::JsonString(value) => {
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            }
            ContentShape::Empty => String::new(),
        }
    }
}

pub fn normalize_message(message: &ChatMessage) -> NormalizedMessage {
    NormalizedMessage::new(
        message.role.clone(),
        ContentShape::of(&message.content).into_text(),
    )
}

/// Same length and order as the input; never fails.
pub fn normalize_messages(messages: &[ChatMessage]) -> Vec<NormalizedMessage> {
    messages.iter().map(normalize_message).collect()
}
