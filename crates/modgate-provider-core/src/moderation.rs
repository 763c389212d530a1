use modgate_common::ProviderConfig;
use modgate_protocol::openai::types::{
    ChatCompletionReply, ChatCompletionRequest, ModerationRequestBody, ModerationVerdict,
    NormalizedMessage, ResponseFormat, Role,
};

use crate::errors::{GateError, GateResult, ReservedCode};
use crate::normalize::normalize_messages;
use crate::upstream::UpstreamHttpRequest;

pub const MODERATION_TEMPERATURE: f64 = 0.0;
pub const MODERATION_MAX_TOKENS: i64 = 100;

const DEFAULT_SYSTEM_PROMPT: &str = r#"# CONTEXT #
You are a senior content-safety reviewer with extensive moderation experience. You review content strictly against the platform's content-safety rules and must identify:
- Sexual or explicit content (including but not limited to nudity and sexual innuendo)
- Violent or terrorist content (including but not limited to gore and violence)
- Illegal content (including but not limited to drugs, gambling and fraud)
- Any other content that may violate laws or regulations

# OBJECTIVE #
As a professional content-safety reviewer you must:
1. Strictly review every submitted text for safety and compliance
2. Identify violations across all of the categories above
3. Output an accurate boolean review result

# STYLE #
- Professional reviewer perspective
- Strict review standard
- Standardized output format

# TONE #
- Serious and professional
- Objective and impartial
- Free of emotion

# RESPONSE #
Output the review result strictly in the following JSON format:
{
    "isViolation": false
}
Set "isViolation" to true if any violating content is detected, otherwise false.

No explanation or any other non-JSON output is allowed.
The object must contain exactly one field, named "isViolation", and its value must be a boolean.
"#;

const DEFAULT_DIRECTIVE: &str =
    "Review the full content of all the messages above against the moderation rules.";

/// Fixed moderation instructions injected into every moderation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationPolicy {
    pub system_prompt: &'static str,
    pub directive: &'static str,
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT,
            directive: DEFAULT_DIRECTIVE,
        }
    }
}

/// Policy first, caller messages flattened in order, review directive last.
pub fn build_moderation_body(
    policy: &ModerationPolicy,
    model: &str,
    request: &ChatCompletionRequest,
) -> ModerationRequestBody {
    let normalized = normalize_messages(&request.messages);
    let mut messages = Vec::with_capacity(normalized.len() + 2);
    messages.push(NormalizedMessage::new(Role::System, policy.system_prompt));
    messages.extend(normalized);
    messages.push(NormalizedMessage::new(Role::User, policy.directive));

    ModerationRequestBody {
        messages,
        model: model.to_string(),
        temperature: MODERATION_TEMPERATURE,
        max_tokens: MODERATION_MAX_TOKENS,
        response_format: ResponseFormat::JsonObject,
    }
}

/// Always buffered: the gate has to finish before anything is relayed.
pub fn build_moderation_request(
    provider: &ProviderConfig,
    policy: &ModerationPolicy,
    model: &str,
    request: &ChatCompletionRequest,
) -> GateResult<UpstreamHttpRequest> {
    let body = build_moderation_body(policy, model, request);
    UpstreamHttpRequest::json_post(provider, &body, false)
}

/// Reads the verdict out of a moderation reply body.
///
/// Fails closed: an unreadable body, a missing first choice, content that is
/// not JSON, or a missing or non-boolean `isViolation` are all errors.
pub fn interpret_verdict(body: &[u8]) -> GateResult<ModerationVerdict> {
    let reply: ChatCompletionReply = serde_json::from_slice(body)
        .map_err(|err| GateError::InvalidModerationResponse(format!("reply body: {err}")))?;
    let content = reply.first_content().ok_or_else(|| {
        GateError::InvalidModerationResponse("reply has no first choice content".to_string())
    })?;
    serde_json::from_str::<ModerationVerdict>(content)
        .map_err(|err| GateError::InvalidModerationResponse(format!("verdict: {err}")))
}

pub fn enforce_verdict(verdict: ModerationVerdict) -> GateResult<()> {
    if verdict.is_violation {
        return Err(GateError::Rejected(ReservedCode::ContentViolation));
    }
    Ok(())
}
