//! folio-watch: follow live content updates from a folio server.
//!
//! Connects to the live channel, reconnects with backoff when it drops, and
//! logs every content change until interrupted.

use clap::Parser;
use folio_client::{ClientConfig, LiveClient};
use folio_core::ServerMessage;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folio-watch")]
#[command(author, version, about = "Follow live content updates from a folio server")]
struct Cli {
    /// Live channel URL, absolute or relative to the origin (overrides LIVE_URL)
    #[arg(short, long)]
    url: Option<String>,

    /// Origin to connect from; https forces wss (overrides LIVE_ORIGIN)
    #[arg(short, long)]
    origin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("folio_client=info,folio_watch=info")),
        )
        .init();

    let config = ClientConfig::from_lookup(|key| {
        let flag = match key {
            "LIVE_URL" => cli.url.clone(),
            "LIVE_ORIGIN" => cli.origin.clone(),
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    })?;
    info!(endpoint = %config.endpoint, "Watching live channel");

    let client = LiveClient::connect(config);
    client.set_on_message(|value| match ServerMessage::from_value(value) {
        Ok(ServerMessage::ContentUpdate(event)) => info!(
            content_type = %event.content_type,
            action = %event.action,
            at = %event.timestamp,
            "{}",
            event.summary()
        ),
        Ok(ServerMessage::Connection { message }) => info!("Server: {}", message),
        Ok(ServerMessage::Acknowledgment { .. }) => debug!("Acknowledged"),
        Err(e) => warn!(error = %e, "Unrecognized live message"),
    });

    let mut liveness = client.liveness();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            changed = liveness.changed() => {
                if changed.is_err() {
                    break;
                }
                let live = *liveness.borrow_and_update();
                info!("Live channel {}", if live { "up" } else { "down" });
            }
            _ = &mut interrupt => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    client.teardown();
    client.closed().await;
    Ok(())
}
