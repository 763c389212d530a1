use clap::Parser;

use modgate_common::GatewayConfigPatch;

#[derive(Parser, Debug)]
#[command(name = "modgate", about = "Moderation gate for chat-completion requests")]
pub(crate) struct Cli {
    #[arg(long, env = "MODGATE_HOST")]
    pub(crate) host: Option<String>,
    #[arg(long, env = "MODGATE_PORT")]
    pub(crate) port: Option<u16>,
    /// Key callers must present as a bearer token.
    #[arg(long, env = "AUTH_KEY", hide_env_values = true)]
    pub(crate) auth_key: Option<String>,
    #[arg(long, env = "FIRST_PROVIDER_URL")]
    pub(crate) first_provider_url: Option<String>,
    #[arg(long, env = "FIRST_PROVIDER_KEY", hide_env_values = true)]
    pub(crate) first_provider_key: Option<String>,
    /// Model that runs the moderation pass.
    #[arg(long, env = "FIRST_PROVIDER_MODEL")]
    pub(crate) first_provider_model: Option<String>,
    #[arg(long, env = "SECOND_PROVIDER_URL")]
    pub(crate) second_provider_url: Option<String>,
    #[arg(long, env = "SECOND_PROVIDER_KEY", hide_env_values = true)]
    pub(crate) second_provider_key: Option<String>,
    #[arg(long, env = "MODERATION_TIMEOUT_MS")]
    pub(crate) moderation_timeout_ms: Option<u64>,
    #[arg(long, env = "RELAY_TIMEOUT_MS")]
    pub(crate) relay_timeout_ms: Option<u64>,
    /// Outbound proxy for both providers.
    #[arg(long, env = "MODGATE_PROXY")]
    pub(crate) proxy: Option<String>,
}

impl Cli {
    pub(crate) fn into_patch(self) -> GatewayConfigPatch {
        GatewayConfigPatch {
            host: self.host,
            port: self.port,
            auth_key: self.auth_key,
            moderation_url: self.first_provider_url,
            moderation_key: self.first_provider_key,
            moderation_model: self.first_provider_model,
            moderation_timeout_ms: self.moderation_timeout_ms,
            relay_url: self.second_provider_url,
            relay_key: self.second_provider_key,
            relay_timeout_ms: self.relay_timeout_ms,
            proxy: self.proxy,
        }
    }
}
