//! Per-connection live channel handler.
//!
//! Accepted sockets are registered with the hub, greeted once, and then split
//! into a writer task (queued frames plus keepalive pings) and a reader loop
//! that acknowledges every inbound frame that parses as JSON. Inbound frames
//! carry no commands; content changes go through the REST handlers.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use folio_core::ServerMessage;
use futures::{SinkExt, StreamExt};
use serde_json::Value;

use crate::hub::{BroadcastHub, ChannelLease};

/// Decide the reply to one inbound text frame.
///
/// Frames that are not JSON are logged and dropped without a reply.
pub fn reply_to(channel: u64, text: &str) -> Option<ServerMessage> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            tracing::debug!(channel, frame = %value, "Live channel frame received");
            Some(ServerMessage::acknowledgment())
        }
        Err(e) => {
            tracing::warn!(channel, error = %e, "Dropping malformed live channel frame");
            None
        }
    }
}

fn queue(lease: &ChannelLease, message: &ServerMessage) {
    match message.to_json() {
        Ok(json) => {
            if !lease.enqueue(json.into()) {
                tracing::debug!(channel = lease.id(), "Live channel writer gone");
            }
        }
        Err(e) => tracing::error!(channel = lease.id(), error = %e, "Failed to encode frame"),
    }
}

/// Serve one upgraded socket until either side closes it.
pub async fn serve_channel(socket: WebSocket, hub: BroadcastHub, ping_interval: Duration) {
    let (lease, mut outbox) = hub.registry().accept();
    let channel = lease.id();

    // The welcome is queued before the channel becomes a broadcast target, so
    // it is always the first frame the client sees.
    queue(&lease, &ServerMessage::welcome());
    lease.mark_open();
    tracing::info!(channel, open = hub.open_channels(), "Live channel opened");

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        // first tick is immediate
        ping.tick().await;
        loop {
            tokio::select! {
                frame = outbox.recv() => {
                    let Some(frame) = frame else { break };
                    if sender.send(Message::Text(frame.to_string())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sender.close().await;
    });

    let recv_loop = async {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if let Some(reply) = reply_to(channel, &text) {
                        queue(&lease, &reply);
                    }
                }
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        if let Some(reply) = reply_to(channel, text) {
                            queue(&lease, &reply);
                        }
                    }
                    Err(_) => {
                        tracing::warn!(channel, len = bytes.len(), "Dropping non-UTF-8 frame");
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(channel, error = %e, "Live channel error");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = &mut send_task => {}
        _ = recv_loop => {}
    }

    lease.mark_closing();
    send_task.abort();
    drop(lease);
    tracing::info!(channel, open = hub.open_channels(), "Live channel closed");
}
