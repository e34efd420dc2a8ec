//! folio-api - HTTP and live-channel server for the folio portfolio

use folio_api::{logging, router, AppState, BroadcastHub, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;
    let _log_guard = logging::init_tracing(&config.log);

    info!(
        env = %config.environment,
        "Live channel: {}",
        if config.ws_enabled { "enabled" } else { "disabled" }
    );
    if config.cors.origins.is_empty() && config.cors.allow_regex.is_none() {
        info!("CORS: no browser origins allowed (set CORS_ORIGINS)");
    }

    let hub = BroadcastHub::new();
    let addr = config.bind_addr()?;
    let app = router(AppState::new(hub, config));

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
