//! BriefRun Control Plane Server

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use briefrun_control_plane::channel::{InMemoryChannel, TaskChannel, WebhookChannel};
use briefrun_control_plane::store::InMemoryDocumentStore;
use briefrun_control_plane::{http, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = Config::parse();
    let http_addr: SocketAddr = config.http_addr.parse()?;

    let channel: Arc<dyn TaskChannel> = match &config.publish_url {
        Some(url) => {
            info!(endpoint = %url, "Publishing task messages to push endpoint");
            Arc::new(WebhookChannel::new(url.clone()))
        }
        None => {
            info!("No publish URL configured - task messages stay in process");
            Arc::new(InMemoryChannel::new())
        }
    };

    let state = AppState::with_system_clock(&config, Arc::new(InMemoryDocumentStore::new()), channel);

    info!(
        http_addr = %http_addr,
        topic = %config.topic,
        decomposition = %config.decomposition,
        monthly_limit = config.monthly_limit,
        daily_limit = config.daily_limit,
        "Starting BriefRun control plane"
    );

    let listener = TcpListener::bind(http_addr).await?;
    axum::serve(listener, http::create_router(state)).await?;

    Ok(())
}
