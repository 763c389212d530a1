//! Gate logic for modgate.
//!
//! This crate intentionally does **not** depend on axum or any concrete HTTP client.
//! It normalizes caller messages, builds the moderation and relay
//! `UpstreamHttpRequest`s, interprets the moderation verdict and maps every
//! failure into an `ErrorEnvelope`, while a higher layer performs IO.

pub mod errors;
pub mod headers;
pub mod moderation;
pub mod normalize;
pub mod relay;
pub mod upstream;

pub use errors::{GateError, GateResult, NormalizedError, ReservedCode, normalize_error};
pub use headers::{Headers, header_get, header_set};
pub use moderation::{
    ModerationPolicy, build_moderation_body, build_moderation_request, enforce_verdict,
    interpret_verdict,
};
pub use normalize::{ContentShape, normalize_message, normalize_messages};
pub use relay::{build_relay_body, build_relay_request, relay_log_summary};
pub use upstream::{
    ByteStream, UpstreamBody, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse,
    UpstreamTransportErrorKind,
};
