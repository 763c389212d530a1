use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorTypeKnown {
    /// 400 / 401 / 405
    #[serde(rename = "invalid_request_error")]
    InvalidRequestError,
    /// 403
    #[serde(rename = "content_filter_error")]
    ContentFilterError,
    /// 503
    #[serde(rename = "connection_error")]
    ConnectionError,
    /// 500
    #[serde(rename = "internal_error")]
    InternalError,
    /// Upstream error without its own type.
    #[serde(rename = "api_error")]
    ApiError,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorType {
    Known(ErrorTypeKnown),
    Custom(String),
}

impl From<ErrorTypeKnown> for ErrorType {
    fn from(value: ErrorTypeKnown) -> Self {
        ErrorType::Known(value)
    }
}

impl From<String> for ErrorType {
    fn from(value: String) -> Self {
        match serde_json::from_value::<ErrorTypeKnown>(JsonValue::String(value.clone())) {
            Ok(known) => ErrorType::Known(known),
            Err(_) => ErrorType::Custom(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Number(i64),
    Text(String),
}

impl ErrorCode {
    pub const CONTENT_VIOLATION: &'static str = "content_violation";
    pub const INVALID_AUTH_KEY: &'static str = "invalid_auth_key";

    pub fn as_status(&self) -> Option<u16> {
        match self {
            ErrorCode::Number(code) if (100..=599).contains(code) => Some(*code as u16),
            _ => None,
        }
    }
}

impl From<u16> for ErrorCode {
    fn from(value: u16) -> Self {
        ErrorCode::Number(i64::from(value))
    }
}

impl From<&str> for ErrorCode {
    fn from(value: &str) -> Self {
        ErrorCode::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub r#type: ErrorType,
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Raw upstream error payload, kept for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_details: Option<JsonValue>,
}

/// Canonical error body for every failure the gate surfaces, in both
/// buffered JSON responses and SSE error frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

impl ErrorEnvelope {
    pub fn new(
        message: impl Into<String>,
        r#type: impl Into<ErrorType>,
        code: impl Into<ErrorCode>,
    ) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: r#type.into(),
                code: code.into(),
                param: None,
                provider_details: None,
            },
        }
    }
}
