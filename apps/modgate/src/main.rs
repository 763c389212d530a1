use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use modgate_core::{Core, UpstreamClientConfig, WreqUpstreamClient};

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("modgate failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = Arc::new(Cli::parse().into_patch().into_config()?);
    let client = WreqUpstreamClient::new(UpstreamClientConfig::from_gateway(&config))?;
    let app = Core::from_config(config.clone(), Arc::new(client)).router();

    let bind = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(
        bind = %bind,
        moderation_model = %config.moderation_model,
        proxy = config.proxy.is_some(),
        "modgate listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("modgate=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => {
            warn!(error = %err, "ctrl-c handler unavailable; serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
