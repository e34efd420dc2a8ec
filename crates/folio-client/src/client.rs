//! Self-healing live channel client.
//!
//! A [`LiveClient`] owns one background driver task. The driver connects,
//! runs the session until the channel closes, waits out the backoff, and
//! tries again until [`LiveClient::teardown`] is called.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::backoff::Backoff;
use crate::config::ClientConfig;
use crate::state::{ClientPhase, ReconnectState};
use crate::transport::{Connector, Frame, Link, WsConnector};

/// Callback invoked with every parsed inbound message.
pub type MessageHandler = Arc<dyn Fn(Value) + Send + Sync>;

struct Shared {
    state: Mutex<ReconnectState>,
    // Read at delivery time so a swap takes effect on the next message
    handler: RwLock<Option<MessageHandler>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    liveness: watch::Sender<bool>,
    shutdown: watch::Sender<bool>,
}

impl Shared {
    fn on_close(&self) -> Option<Duration> {
        self.state.lock().on_close()
    }

    fn dispatch(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Dropping malformed live channel message");
                return;
            }
        };
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            // A panicking callback must not take the driver down with it
            if panic::catch_unwind(AssertUnwindSafe(|| handler(value))).is_err() {
                warn!("Live message handler panicked, message dropped");
            }
        }
    }
}

pub struct LiveClient {
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
    endpoint: Url,
}

impl LiveClient {
    /// Start connecting to `config.endpoint` over WebSocket.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(config: ClientConfig) -> Self {
        Self::with_connector(config, WsConnector)
    }

    pub fn with_connector<C: Connector>(config: ClientConfig, connector: C) -> Self {
        let backoff = Backoff::new(config.backoff_floor, config.backoff_ceiling);
        let (liveness, _) = watch::channel(false);
        let (shutdown, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            state: Mutex::new(ReconnectState::new(backoff)),
            handler: RwLock::new(None),
            outbound: Mutex::new(None),
            liveness,
            shutdown,
        });

        let driver = tokio::spawn(drive(shared.clone(), connector, config.endpoint.clone()));

        Self {
            shared,
            driver: Mutex::new(Some(driver)),
            endpoint: config.endpoint,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Replace the message callback. Applies from the next delivered message
    /// without reconnecting.
    pub fn set_on_message<F>(&self, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        *self.shared.handler.write() = Some(Arc::new(handler));
    }

    pub fn is_live(&self) -> bool {
        *self.shared.liveness.borrow()
    }

    /// Watch liveness changes. The current value is readable immediately.
    pub fn liveness(&self) -> watch::Receiver<bool> {
        self.shared.liveness.subscribe()
    }

    pub fn phase(&self) -> ClientPhase {
        self.shared.state.lock().phase()
    }

    /// Delay the next reconnect would wait.
    pub fn current_backoff(&self) -> Duration {
        self.shared.state.lock().current_backoff()
    }

    /// Send a JSON payload if the channel is open. Otherwise a silent no-op.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) {
        if !self.shared.state.lock().is_live() {
            return;
        }
        let outbound = self.shared.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return;
        };
        match serde_json::to_string(payload) {
            Ok(text) => {
                let _ = tx.send(text);
            }
            Err(e) => warn!(error = %e, "Failed to serialize outbound message"),
        }
    }

    /// Stop reconnecting, close any open channel, and drop the callback.
    /// Safe to call more than once.
    pub fn teardown(&self) {
        if !self.shared.state.lock().teardown() {
            return;
        }
        self.shared.handler.write().take();
        self.shared.outbound.lock().take();
        self.shared.shutdown.send_replace(true);
        self.shared.liveness.send_replace(false);
        info!(endpoint = %self.endpoint, "Live client torn down");
    }

    /// Wait for the driver task to finish. Returns immediately if already
    /// awaited.
    pub async fn closed(&self) {
        let handle = self.driver.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for LiveClient {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn drive<C: Connector>(shared: Arc<Shared>, connector: C, endpoint: Url) {
    let mut shutdown = shared.shutdown.subscribe();
    let mut attempt: u64 = 0;

    loop {
        if !shared.state.lock().begin_connect() {
            break;
        }
        attempt += 1;
        debug!(attempt, endpoint = %endpoint, "Connecting live channel");

        let connected = tokio::select! {
            biased;
            _ = cancelled(&mut shutdown) => break,
            result = connector.connect(&endpoint) => result,
        };

        let delay = match connected {
            Ok(link) => {
                run_session(&shared, link, &mut shutdown).await;
                shared.liveness.send_replace(false);
                info!(endpoint = %endpoint, "Live channel disconnected");
                shared.on_close()
            }
            Err(e) => {
                warn!(attempt, error = %e, "Live channel connect failed");
                shared.on_close()
            }
        };

        let Some(delay) = delay else {
            break;
        };
        debug!(delay_ms = delay.as_millis() as u64, "Scheduling live channel reconnect");

        tokio::select! {
            biased;
            _ = cancelled(&mut shutdown) => break,
            _ = tokio::time::sleep(delay) => {}
        }

        if !shared.state.lock().on_timer_fired() {
            break;
        }
    }

    shared.liveness.send_replace(false);
    debug!(attempts = attempt, "Live channel driver stopped");
}

async fn run_session(
    shared: &Shared,
    mut link: Box<dyn Link>,
    shutdown: &mut watch::Receiver<bool>,
) {
    if !shared.state.lock().on_open() {
        link.close().await;
        return;
    }
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    *shared.outbound.lock() = Some(tx);
    shared.liveness.send_replace(true);
    info!("Live channel connected");

    loop {
        tokio::select! {
            biased;
            _ = cancelled(shutdown) => {
                link.close().await;
                break;
            }
            Some(text) = rx.recv() => {
                if let Err(e) = link.send_text(text).await {
                    warn!(error = %e, "Live channel send failed");
                }
            }
            frame = link.next_frame() => match frame {
                Ok(Frame::Text(text)) => shared.dispatch(&text),
                Ok(Frame::Closed) => break,
                Err(e) => {
                    // Errors end the session; the close path schedules the reconnect
                    warn!(error = %e, "Live channel error");
                    break;
                }
            },
        }
    }

    shared.outbound.lock().take();
}
