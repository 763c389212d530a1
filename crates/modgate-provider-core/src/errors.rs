use std::error::Error;
use std::fmt;

use serde_json::Value as JsonValue;

use modgate_protocol::error::{ErrorCode, ErrorEnvelope, ErrorType, ErrorTypeKnown};

use crate::upstream::UpstreamFailure;

pub type GateResult<T> = Result<T, GateError>;

pub const INVALID_MODERATION_RESPONSE: &str = "Invalid moderation response format";
pub const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable, please try again later";

/// Intentional, already-shaped refusals. Never rewritten by normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedCode {
    ContentViolation,
    InvalidAuthKey,
}

impl ReservedCode {
    pub fn code(self) -> &'static str {
        match self {
            ReservedCode::ContentViolation => ErrorCode::CONTENT_VIOLATION,
            ReservedCode::InvalidAuthKey => ErrorCode::INVALID_AUTH_KEY,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ReservedCode::ContentViolation => "Content violation detected",
            ReservedCode::InvalidAuthKey => "Invalid authentication key",
        }
    }

    pub fn error_type(self) -> ErrorTypeKnown {
        match self {
            ReservedCode::ContentViolation => ErrorTypeKnown::ContentFilterError,
            ReservedCode::InvalidAuthKey => ErrorTypeKnown::InvalidRequestError,
        }
    }

    pub fn status(self) -> u16 {
        match self {
            ReservedCode::ContentViolation => 403,
            ReservedCode::InvalidAuthKey => 401,
        }
    }
}

#[derive(Debug, Clone)]
pub enum GateError {
    Upstream(UpstreamFailure),
    Rejected(ReservedCode),
    /// The moderation reply could not be read as a verdict. Carries the
    /// reason for logs; callers only ever see the fixed message.
    InvalidModerationResponse(String),
    InvalidRequest { message: String, status: u16 },
    Internal { message: String, status: Option<u16> },
}

impl GateError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        GateError::InvalidRequest {
            message: message.into(),
            status: 400,
        }
    }

    pub fn method_not_allowed() -> Self {
        GateError::InvalidRequest {
            message: "Method not allowed".to_string(),
            status: 405,
        }
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::Upstream(failure) => write!(f, "{failure}"),
            GateError::Rejected(code) => write!(f, "{}: {}", code.code(), code.message()),
            GateError::InvalidModerationResponse(reason) => {
                write!(f, "{INVALID_MODERATION_RESPONSE}: {reason}")
            }
            GateError::InvalidRequest { message, .. } => write!(f, "invalid request: {message}"),
            GateError::Internal { message, .. } => write!(f, "{message}"),
        }
    }
}

impl Error for GateError {}

impl From<UpstreamFailure> for GateError {
    fn from(value: UpstreamFailure) -> Self {
        GateError::Upstream(value)
    }
}

/// An envelope ready to emit, plus the status used when it goes out as a
/// buffered JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedError {
    pub status: u16,
    pub envelope: ErrorEnvelope,
}

/// Maps any failure of a call into the one caller-visible error shape.
///
/// The checks run in priority order: an upstream error payload wins over
/// everything, then reserved codes, then connection failures, then the
/// generic fallback.
pub fn normalize_error(err: &GateError) -> NormalizedError {
    if let GateError::Upstream(UpstreamFailure::Http { status, body, .. }) = err
        && let Some(normalized) = from_upstream_payload(*status, body)
    {
        return normalized;
    }

    if let GateError::Rejected(code) = err {
        return NormalizedError {
            status: code.status(),
            envelope: ErrorEnvelope::new(code.message(), code.error_type(), code.code()),
        };
    }

    if let GateError::Upstream(UpstreamFailure::Transport { kind, .. }) = err
        && kind.is_unavailable()
    {
        return NormalizedError {
            status: 503,
            envelope: ErrorEnvelope::new(
                UNAVAILABLE_MESSAGE,
                ErrorTypeKnown::ConnectionError,
                503u16,
            ),
        };
    }

    match err {
        GateError::InvalidRequest { message, status } => NormalizedError {
            status: *status,
            envelope: ErrorEnvelope::new(
                message.clone(),
                ErrorTypeKnown::InvalidRequestError,
                *status,
            ),
        },
        GateError::InvalidModerationResponse(_) => internal(INVALID_MODERATION_RESPONSE, 500),
        GateError::Internal { message, status } => internal(message, status.unwrap_or(500)),
        GateError::Upstream(UpstreamFailure::Http { status, .. }) => {
            internal(format!("Request failed with status code {status}"), *status)
        }
        GateError::Upstream(failure @ UpstreamFailure::Transport { .. }) => {
            internal(failure.to_string(), 500)
        }
        GateError::Rejected(_) => internal("Internal server error", 500),
    }
}

fn internal(message: impl Into<String>, status: u16) -> NormalizedError {
    NormalizedError {
        status,
        envelope: ErrorEnvelope::new(message, ErrorTypeKnown::InternalError, status),
    }
}

/// Empty bodies carry no structure and fall through to the generic case.
fn from_upstream_payload(status: u16, body: &[u8]) -> Option<NormalizedError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    let details = serde_json::from_slice::<JsonValue>(body)
        .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(body).into_owned()));

    let structured = match &details {
        JsonValue::Object(map) => match map.get("error") {
            Some(JsonValue::Object(inner)) => Some(inner),
            Some(_) => None,
            None => Some(map),
        },
        _ => None,
    };
    let field_str = |name: &str| {
        structured
            .and_then(|map| map.get(name))
            .and_then(JsonValue::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let message =
        field_str("message").unwrap_or_else(|| format!("Request failed with status code {status}"));
    let r#type = field_str("type").map_or_else(|| ErrorTypeKnown::ApiError.into(), ErrorType::from);
    let code = match structured.and_then(|map| map.get("code")) {
        Some(JsonValue::Number(number)) if number.as_i64().is_some_and(|n| n != 0) => {
            number.as_i64().map(ErrorCode::Number)
        }
        Some(JsonValue::String(text)) if !text.is_empty() => Some(ErrorCode::Text(text.clone())),
        _ => None,
    }
    .unwrap_or(ErrorCode::from(status));

    let mut envelope = ErrorEnvelope::new(message, r#type, code);
    envelope.error.param = field_str("param");
    // A code that is not an HTTP status (e.g. "rate_limit_exceeded") resolves to 500.
    let resolved = envelope.error.code.as_status().unwrap_or(500);
    envelope.error.provider_details = Some(details);

    Some(NormalizedError {
        status: resolved,
        envelope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    use crate::upstream::UpstreamTransportErrorKind;

    fn http(status: u16, body: &str) -> GateError {
        GateError::Upstream(UpstreamFailure::Http {
            status,
            headers: Vec::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    fn transport(kind: UpstreamTransportErrorKind) -> GateError {
        GateError::Upstream(UpstreamFailure::Transport {
            kind,
            message: "boom".to_string(),
        })
    }

    #[test]
    fn upstream_error_object_is_used() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded","param":null}}"#;
        let out = normalize_error(&http(429, body));
        assert_eq!(out.status, 500);
        let value = serde_json::to_value(&out.envelope).unwrap();
        assert_eq!(value["error"]["message"], "Rate limit reached");
        assert_eq!(value["error"]["type"], "requests");
        assert_eq!(value["error"]["code"], "rate_limit_exceeded");
        assert!(value["error"].get("param").is_none());
        assert_eq!(
            value["error"]["provider_details"],
            serde_json::from_str::<JsonValue>(body).unwrap()
        );
    }

    #[test]
    fn upstream_flat_payload_falls_back_to_status() {
        let out = normalize_error(&http(502, r#"{"detail":"bad gateway"}"#));
        assert_eq!(out.status, 502);
        assert_eq!(
            out.envelope.error.message,
            "Request failed with status code 502"
        );
        assert_eq!(
            out.envelope.error.r#type,
            ErrorType::Known(ErrorTypeKnown::ApiError)
        );
        assert_eq!(out.envelope.error.code, ErrorCode::Number(502));
    }

    #[test]
    fn upstream_numeric_code_drives_status() {
        let out = normalize_error(&http(400, r#"{"error":{"message":"nope","code":401}}"#));
        assert_eq!(out.status, 401);
        assert_eq!(out.envelope.error.code, ErrorCode::Number(401));
    }

    #[test]
    fn upstream_text_code_resolves_to_500() {
        let body = r#"{"error":{"code":"rate_limit_exceeded"}}"#;
        let out = normalize_error(&http(429, body));
        assert_eq!(out.status, 500);
        assert_eq!(out.envelope.error.code, ErrorCode::from("rate_limit_exceeded"));
        assert_eq!(
            out.envelope.error.message,
            "Request failed with status code 429"
        );
    }

    #[test]
    fn upstream_text_body_kept_as_details() {
        let out = normalize_error(&http(500, "oops"));
        assert_eq!(out.envelope.error.provider_details, Some(json!("oops")));
        assert_eq!(out.envelope.error.code, ErrorCode::Number(500));
    }

    #[test]
    fn upstream_payload_wins_even_with_reserved_code() {
        let body = r#"{"error":{"message":"blocked upstream","code":"content_violation"}}"#;
        let out = normalize_error(&http(400, body));
        assert_eq!(out.status, 500);
        assert_eq!(out.envelope.error.message, "blocked upstream");
        assert!(out.envelope.error.provider_details.is_some());
        assert_eq!(
            out.envelope.error.r#type,
            ErrorType::Known(ErrorTypeKnown::ApiError)
        );
    }

    #[test]
    fn empty_upstream_body_is_internal() {
        let out = normalize_error(&http(504, ""));
        assert_eq!(out.status, 504);
        assert_eq!(
            out.envelope.error.r#type,
            ErrorType::Known(ErrorTypeKnown::InternalError)
        );
        assert_eq!(out.envelope.error.code, ErrorCode::Number(504));
    }

    #[test]
    fn reserved_codes_preserved() {
        let out = normalize_error(&GateError::Rejected(ReservedCode::ContentViolation));
        assert_eq!(out.status, 403);
        assert_eq!(
            serde_json::to_value(&out.envelope).unwrap(),
            json!({"error": {
                "message": "Content violation detected",
                "type": "content_filter_error",
                "code": "content_violation"
            }})
        );

        let out = normalize_error(&GateError::Rejected(ReservedCode::InvalidAuthKey));
        assert_eq!(out.status, 401);
        assert_eq!(out.envelope.error.code, ErrorCode::from("invalid_auth_key"));
    }

    #[test]
    fn unreachable_upstream_is_connection_error() {
        for kind in [
            UpstreamTransportErrorKind::Connect,
            UpstreamTransportErrorKind::Timeout,
            UpstreamTransportErrorKind::ReadTimeout,
        ] {
            let out = normalize_error(&transport(kind));
            assert_eq!(out.status, 503);
            assert_eq!(out.envelope.error.message, UNAVAILABLE_MESSAGE);
            assert_eq!(
                out.envelope.error.r#type,
                ErrorType::Known(ErrorTypeKnown::ConnectionError)
            );
            assert_eq!(out.envelope.error.code, ErrorCode::Number(503));
        }
    }

    #[test]
    fn other_transport_failures_are_internal() {
        let out = normalize_error(&transport(UpstreamTransportErrorKind::Dns));
        assert_eq!(out.status, 500);
        assert_eq!(
            out.envelope.error.r#type,
            ErrorType::Known(ErrorTypeKnown::InternalError)
        );
    }

    #[test]
    fn unreadable_verdict_is_internal_error() {
        let out = normalize_error(&GateError::InvalidModerationResponse(
            "expected value".to_string(),
        ));
        assert_eq!(out.status, 500);
        assert_eq!(out.envelope.error.message, INVALID_MODERATION_RESPONSE);
        assert_eq!(
            out.envelope.error.r#type,
            ErrorType::Known(ErrorTypeKnown::InternalError)
        );
    }

    #[test]
    fn invalid_request_keeps_status() {
        let out = normalize_error(&GateError::method_not_allowed());
        assert_eq!(out.status, 405);
        assert_eq!(
            serde_json::to_value(&out.envelope).unwrap(),
            json!({"error": {
                "message": "Method not allowed",
                "type": "invalid_request_error",
                "code": 405
            }})
        );
    }
}
