use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use modgate_common::ProviderConfig;

use crate::errors::GateError;
use crate::headers::{Headers, header_set};

/// Live relay body. An `Err` item ends the stream with that failure.
pub type ByteStream = tokio::sync::mpsc::Receiver<Result<Bytes, UpstreamFailure>>;

#[derive(Debug, Clone)]
pub struct UpstreamHttpRequest {
    pub url: String,
    pub headers: Headers,
    pub body: Bytes,
    pub is_stream: bool,
    /// Deadline for this call, independent of any other upstream call.
    pub timeout: Duration,
}

impl UpstreamHttpRequest {
    /// Bearer-authenticated JSON POST to the provider's chat-completions endpoint.
    pub fn json_post<T: Serialize>(
        provider: &ProviderConfig,
        body: &T,
        is_stream: bool,
    ) -> Result<Self, GateError> {
        let body = serde_json::to_vec(body).map_err(|err| GateError::Internal {
            message: format!("failed to encode upstream request: {err}"),
            status: None,
        })?;
        let mut headers = Headers::new();
        header_set(
            &mut headers,
            "Authorization",
            format!("Bearer {}", provider.api_key),
        );
        header_set(&mut headers, "Content-Type", "application/json");
        header_set(&mut headers, "Accept", "application/json");
        Ok(Self {
            url: provider.chat_completions_url(),
            headers,
            body: Bytes::from(body),
            is_stream,
            timeout: provider.timeout(),
        })
    }
}

#[derive(Debug)]
pub enum UpstreamBody {
    Bytes(Bytes),
    Stream(ByteStream),
}

#[derive(Debug)]
pub struct UpstreamHttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: UpstreamBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UpstreamTransportErrorKind {
    Timeout,
    ReadTimeout,
    Connect,
    Dns,
    Tls,
    Other,
}

impl UpstreamTransportErrorKind {
    /// Refused or aborted: the upstream is unreachable right now.
    pub fn is_unavailable(self) -> bool {
        matches!(
            self,
            UpstreamTransportErrorKind::Connect
                | UpstreamTransportErrorKind::Timeout
                | UpstreamTransportErrorKind::ReadTimeout
        )
    }
}

#[derive(Debug, Clone)]
pub enum UpstreamFailure {
    /// Transport-level failures (no HTTP response).
    Transport {
        kind: UpstreamTransportErrorKind,
        message: String,
    },
    /// HTTP error response captured as bytes (non-2xx).
    Http {
        status: u16,
        headers: Headers,
        body: Bytes,
    },
}

impl fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamFailure::Transport { kind, message } => {
                write!(f, "upstream transport error ({kind:?}): {message}")
            }
            UpstreamFailure::Http { status, .. } => {
                write!(f, "Request failed with status code {status}")
            }
        }
    }
}
