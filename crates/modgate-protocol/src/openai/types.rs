pub use crate::openai::chat_completions::request::{
    ChatCompletionRequest, ModerationRequestBody, RelayRequestBody,
};
pub use crate::openai::chat_completions::response::{
    ChatCompletionReply, ChatCompletionReplyChoice, ChatCompletionReplyMessage, ModerationVerdict,
};
pub use crate::openai::chat_completions::types::{
    ChatMessage, ContentPart, MessageContent, NormalizedMessage, ResponseFormat, Role,
};
