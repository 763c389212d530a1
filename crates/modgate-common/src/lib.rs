use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8787;
/// The gating call fails fast.
pub const DEFAULT_MODERATION_TIMEOUT_MS: u64 = 45_000;
/// The relay call leaves room for generation.
pub const DEFAULT_RELAY_TIMEOUT_MS: u64 = 60_000;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GatewayConfigError {
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
    #[error("invalid config field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// One upstream chat-completions endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
}

impl ProviderConfig {
    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            CHAT_COMPLETIONS_PATH
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Final configuration used by the running process. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Key callers must present as `Authorization: Bearer <key>`.
    pub auth_key: String,
    /// First provider: runs the moderation pass.
    pub moderation: ProviderConfig,
    pub moderation_model: String,
    /// Second provider: receives the relayed request.
    pub relay: ProviderConfig,
    /// Optional outbound proxy (for upstream egress).
    pub proxy: Option<String>,
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Optional layer collected from CLI flags and environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub auth_key: Option<String>,
    pub moderation_url: Option<String>,
    pub moderation_key: Option<String>,
    pub moderation_model: Option<String>,
    pub moderation_timeout_ms: Option<u64>,
    pub relay_url: Option<String>,
    pub relay_key: Option<String>,
    pub relay_timeout_ms: Option<u64>,
    pub proxy: Option<String>,
}

impl GatewayConfigPatch {
    pub fn into_config(self) -> Result<GatewayConfig, GatewayConfigError> {
        let moderation_timeout_ms = positive(
            self.moderation_timeout_ms,
            DEFAULT_MODERATION_TIMEOUT_MS,
            "moderation_timeout_ms",
        )?;
        let relay_timeout_ms = positive(
            self.relay_timeout_ms,
            DEFAULT_RELAY_TIMEOUT_MS,
            "relay_timeout_ms",
        )?;

        Ok(GatewayConfig {
            host: non_blank(self.host).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            auth_key: required(self.auth_key, "auth_key")?,
            moderation: ProviderConfig {
                base_url: required(self.moderation_url, "first_provider_url")?,
                api_key: required(self.moderation_key, "first_provider_key")?,
                timeout_ms: moderation_timeout_ms,
            },
            moderation_model: required(self.moderation_model, "first_provider_model")?,
            relay: ProviderConfig {
                base_url: required(self.relay_url, "second_provider_url")?,
                api_key: required(self.relay_key, "second_provider_key")?,
                timeout_ms: relay_timeout_ms,
            },
            proxy: non_blank(self.proxy),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, GatewayConfigError> {
    non_blank(value).ok_or(GatewayConfigError::MissingField(field))
}

fn positive(
    value: Option<u64>,
    default: u64,
    field: &'static str,
) -> Result<u64, GatewayConfigError> {
    match value {
        None => Ok(default),
        Some(0) => Err(GatewayConfigError::InvalidField {
            field,
            reason: "must be greater than zero".to_string(),
        }),
        Some(value) => Ok(value),
    }
}
