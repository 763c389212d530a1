use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::any;

use modgate_common::GatewayConfig;

use crate::auth::{AuthProvider, StaticKeyAuth};
use crate::cors::cors;
use crate::gate::GateEngine;
use crate::handler::completions_handler;
use crate::upstream_client::UpstreamClient;

pub const CHAT_COMPLETIONS_ROUTE: &str = "/v1/chat/completions";
pub const LEGACY_COMPLETIONS_ROUTE: &str = "/api/completions";

pub struct CoreState {
    pub engine: GateEngine,
    pub auth: Arc<dyn AuthProvider>,
}

pub struct Core {
    state: Arc<CoreState>,
}

impl Core {
    pub fn new(engine: GateEngine, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            state: Arc::new(CoreState { engine, auth }),
        }
    }

    /// Gate guarded by the configured shared key.
    pub fn from_config(config: Arc<GatewayConfig>, client: Arc<dyn UpstreamClient>) -> Self {
        let auth = Arc::new(StaticKeyAuth::new(&config.auth_key));
        Self::new(GateEngine::new(config, client), auth)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(CHAT_COMPLETIONS_ROUTE, any(completions_handler))
            .route(LEGACY_COMPLETIONS_ROUTE, any(completions_handler))
            .layer(middleware::from_fn(cors))
            .with_state(self.state.clone())
    }
}
