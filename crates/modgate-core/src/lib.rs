//! HTTP side of modgate: the axum router, the gate pipeline and the
//! `wreq` client that reaches both providers.

pub mod auth;
pub mod core;
pub mod cors;
pub mod gate;
pub mod handler;
pub mod transport;
pub mod upstream_client;

pub use auth::{AuthProvider, NoopAuth, StaticKeyAuth};
pub use crate::core::{Core, CoreState};
pub use gate::{GateEngine, RelayOutcome};
pub use transport::REQUEST_ID_HEADER;
pub use upstream_client::{UpstreamClient, UpstreamClientConfig, WreqUpstreamClient};
