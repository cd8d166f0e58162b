use std::sync::Arc;

use rawhistory::backend::HttpHistoryBackend;
use rawhistory::config::ServerConfig;
use rawhistory::server;
use rawhistory::telemetry::init_subscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    let _guard = init_subscriber(config.telemetry.clone())?;

    tracing::info!(
        backend = %config.backend.base_url,
        page_size = ?config.backend.maximum_page_size,
        "history server configured"
    );

    let backend = Arc::new(HttpHistoryBackend::new(config.backend.clone())?);
    server::serve(&config, backend).await?;
    Ok(())
}
