//! Wire shapes spoken by the gate: the OpenAI-compatible chat-completion
//! request and reply, the error envelope, and server-sent-event framing.

pub mod error;
pub mod openai;
pub mod sse;
