/// MTA control plane
///
/// Main entry point. Loads configuration from the environment and starts the
/// HTTP server together with the background jobs:
/// - cleanup of expired and orphaned data (designated instance only)
/// - lock owner heartbeat and stale owner reclaim
/// - health check at /healthz

use mta_control::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
