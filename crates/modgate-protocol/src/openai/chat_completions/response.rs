use serde::{Deserialize, Serialize};

/// The subset of a chat-completion reply the gate reads from the moderation
/// provider. Relay replies are never decoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionReply {
    #[serde(default)]
    pub choices: Vec<ChatCompletionReplyChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionReplyChoice {
    #[serde(default)]
    pub message: Option<ChatCompletionReplyMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionReplyMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionReply {
    /// Content string of the first choice, if any.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
    }
}

/// Verdict object the moderation model is instructed to emit.
///
/// `isViolation` is required and must be a JSON boolean; there is no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationVerdict {
    #[serde(rename = "isViolation")]
    pub is_violation: bool,
}
