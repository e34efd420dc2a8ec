//! Connection registry and broadcast hub.
//!
//! The registry is the set of live channels the transport has accepted. Only
//! the transport changes it: [`ChannelRegistry::accept`] hands out a
//! [`ChannelLease`], and dropping the lease removes the channel. The
//! [`BroadcastHub`] only iterates it.
//!
//! Each channel has a single writer task fed by an unbounded queue, so frames
//! reach a channel in the order they were enqueued. Broadcasting is a
//! synchronous enqueue loop: it never waits on a slow consumer and never
//! retries. Channels that are not `Open` when a broadcast runs are skipped and
//! never see that frame.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use folio_core::{
    content_types, AtomicChannelState, ChannelState, ContentAction, ContentNotifier, ServerMessage,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// A serialized frame queued for one channel's writer.
pub type Outbound = Arc<str>;

/// Receiving end of a channel's queue, drained by its writer task.
pub type Outbox = mpsc::UnboundedReceiver<Outbound>;

struct ChannelSlot {
    state: AtomicChannelState,
    outbound: mpsc::UnboundedSender<Outbound>,
}

/// The set of channels known to the transport.
pub struct ChannelRegistry {
    channels: RwLock<HashMap<u64, Arc<ChannelSlot>>>,
    next_id: AtomicU64,
}

impl ChannelRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Register a freshly accepted channel in the `Connecting` state.
    ///
    /// The returned outbox must be drained by the channel's writer.
    pub fn accept(self: &Arc<Self>) -> (ChannelLease, Outbox) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let slot = Arc::new(ChannelSlot {
            state: AtomicChannelState::new(ChannelState::Connecting),
            outbound: tx,
        });
        self.channels.write().insert(id, slot.clone());

        let lease = ChannelLease {
            id,
            slot,
            registry: Arc::clone(self),
        };
        (lease, rx)
    }

    /// Number of channels currently `Open`.
    pub fn open_count(&self) -> usize {
        self.channels
            .read()
            .values()
            .filter(|slot| slot.state.load().is_open())
            .count()
    }

    /// Number of channels in any state.
    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }
}

/// The transport's hold on one registered channel.
///
/// Dropping the lease marks the channel `Closed` and removes it from the
/// registry.
pub struct ChannelLease {
    id: u64,
    slot: Arc<ChannelSlot>,
    registry: Arc<ChannelRegistry>,
}

impl ChannelLease {
    /// Registry-local id, for log correlation only.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ChannelState {
        self.slot.state.load()
    }

    /// Make the channel a broadcast target.
    pub fn mark_open(&self) {
        self.slot.state.store(ChannelState::Open);
    }

    /// Stop broadcasts to a channel that is shutting down.
    pub fn mark_closing(&self) {
        self.slot.state.store(ChannelState::Closing);
    }

    /// Queue a frame for this channel only, behind anything already queued.
    ///
    /// Returns `false` when the writer is gone.
    pub fn enqueue(&self, frame: Outbound) -> bool {
        self.slot.outbound.send(frame).is_ok()
    }
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        self.slot.state.store(ChannelState::Closed);
        self.registry.channels.write().remove(&self.id);
    }
}

/// Fans frames out to every open channel.
///
/// Cheap to clone; clones share one registry. Construct one per server and
/// inject it through router state.
#[derive(Clone)]
pub struct BroadcastHub {
    registry: Arc<ChannelRegistry>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::with_registry(ChannelRegistry::new())
    }

    pub fn with_registry(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Number of channels a broadcast would currently reach.
    pub fn open_channels(&self) -> usize {
        self.registry.open_count()
    }

    /// Serialize `payload` once and queue it on every open channel.
    ///
    /// A payload that fails to serialize is logged and dropped.
    pub fn broadcast<T: Serialize + ?Sized>(&self, payload: &T) {
        match serde_json::to_string(payload) {
            Ok(text) => self.broadcast_text(text.into()),
            Err(e) => {
                tracing::error!(error = %e, "Broadcast payload is not serializable, dropping");
            }
        }
    }

    fn broadcast_text(&self, frame: Outbound) {
        let channels = self.registry.channels.read();
        let mut delivered = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;

        for (id, slot) in channels.iter() {
            if !slot.state.load().is_open() {
                skipped += 1;
                continue;
            }
            if slot.outbound.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                failed += 1;
                tracing::warn!(channel = id, "Live channel writer gone, frame dropped");
            }
        }

        tracing::debug!(delivered, skipped, failed, "Broadcast");
    }

    /// Build a `content_update` frame and broadcast it.
    pub fn broadcast_content_update(&self, content_type: &str, action: ContentAction, data: Value) {
        if !content_types::is_known(content_type) {
            // Still broadcast; the tag is a free string on the wire
            tracing::debug!(content_type, "Unrecognized content type");
        }
        tracing::debug!(content_type, %action, "Broadcasting content update");
        self.broadcast(&ServerMessage::content_update(content_type, action, data));
    }
}

impl ContentNotifier for BroadcastHub {
    fn notify_content_change(&self, content_type: &str, action: ContentAction, data: Value) {
        self.broadcast_content_update(content_type, action, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn drain(outbox: &mut Outbox) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = outbox.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    #[test]
    fn test_accept_registers_connecting_channel() {
        let hub = BroadcastHub::new();
        let (lease, _outbox) = hub.registry().accept();

        assert_eq!(lease.state(), ChannelState::Connecting);
        assert_eq!(hub.registry().len(), 1);
        assert_eq!(hub.open_channels(), 0);

        lease.mark_open();
        assert_eq!(hub.open_channels(), 1);
    }

    #[test]
    fn test_dropping_lease_unregisters() {
        let hub = BroadcastHub::new();
        let (a, _a_out) = hub.registry().accept();
        let (b, _b_out) = hub.registry().accept();
        a.mark_open();
        b.mark_open();
        assert_ne!(a.id(), b.id());

        drop(a);
        assert_eq!(hub.registry().len(), 1);
        assert_eq!(hub.open_channels(), 1);

        drop(b);
        assert!(hub.registry().is_empty());
    }

    #[test]
    fn test_broadcast_skips_channels_not_open() {
        let hub = BroadcastHub::new();
        let (open, mut open_out) = hub.registry().accept();
        let (_connecting, mut connecting_out) = hub.registry().accept();
        let (closing, mut closing_out) = hub.registry().accept();
        open.mark_open();
        closing.mark_open();
        closing.mark_closing();

        hub.broadcast(&json!({"n": 1}));

        assert_eq!(drain(&mut open_out), vec![json!({"n": 1})]);
        assert!(drain(&mut connecting_out).is_empty());
        assert!(drain(&mut closing_out).is_empty());
    }

    #[test]
    fn test_broadcast_preserves_order_per_channel() {
        let hub = BroadcastHub::new();
        let (a, mut a_out) = hub.registry().accept();
        let (b, mut b_out) = hub.registry().accept();
        a.mark_open();

        hub.broadcast(&json!({"n": 1}));
        b.mark_open();
        hub.broadcast(&json!({"n": 2}));
        hub.broadcast(&json!({"n": 3}));

        assert_eq!(
            drain(&mut a_out),
            vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]
        );
        // b was not open for the first broadcast and never gets it
        assert_eq!(drain(&mut b_out), vec![json!({"n": 2}), json!({"n": 3})]);
    }

    #[test]
    fn test_dead_writer_does_not_block_others() {
        let hub = BroadcastHub::new();
        let (dead, dead_out) = hub.registry().accept();
        let (live, mut live_out) = hub.registry().accept();
        dead.mark_open();
        live.mark_open();
        drop(dead_out);

        hub.broadcast(&json!({"n": 1}));
        hub.broadcast(&json!({"n": 2}));

        assert_eq!(drain(&mut live_out), vec![json!({"n": 1}), json!({"n": 2})]);
        assert!(!dead.enqueue("{}".into()));
    }

    #[test]
    fn test_unserializable_payload_is_dropped() {
        struct Broken;
        impl Serialize for Broken {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("cannot encode"))
            }
        }

        let hub = BroadcastHub::new();
        let (lease, mut outbox) = hub.registry().accept();
        lease.mark_open();

        hub.broadcast(&Broken);
        hub.broadcast(&json!({"after": true}));

        assert_eq!(drain(&mut outbox), vec![json!({"after": true})]);
    }

    #[test]
    fn test_broadcast_with_no_channels_is_noop() {
        let hub = BroadcastHub::new();
        hub.broadcast_content_update("project", ContentAction::Create, json!({"id": 1}));
        assert!(hub.registry().is_empty());
    }

    #[test]
    fn test_content_update_envelope() {
        let hub = BroadcastHub::new();
        let (lease, mut outbox) = hub.registry().accept();
        lease.mark_open();

        hub.broadcast_content_update("project", ContentAction::Update, json!({"id": 7}));

        let frames = drain(&mut outbox);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "content_update");
        assert_eq!(frames[0]["contentType"], "project");
        assert_eq!(frames[0]["action"], "update");
        assert_eq!(frames[0]["data"], json!({"id": 7}));
        assert!(frames[0]["timestamp"].is_string());
    }

    #[test]
    fn test_two_open_one_reconnecting() {
        let hub = BroadcastHub::new();
        let (c1, mut c1_out) = hub.registry().accept();
        let (c2, mut c2_out) = hub.registry().accept();
        let (c3, _c3_out) = hub.registry().accept();
        c1.mark_open();
        c2.mark_open();
        c3.mark_open();

        // c3 drops and is between reconnect attempts
        drop(c3);
        hub.broadcast_content_update("project", ContentAction::Update, json!({"id": 7}));

        // c3 comes back on a new channel
        let (c3, mut c3_out) = hub.registry().accept();
        c3.mark_open();

        assert_eq!(drain(&mut c1_out).len(), 1);
        assert_eq!(drain(&mut c2_out).len(), 1);
        assert!(drain(&mut c3_out).is_empty());
    }

    #[test]
    fn test_hub_as_content_notifier() {
        let hub = BroadcastHub::new();
        let (lease, mut outbox) = hub.registry().accept();
        lease.mark_open();

        let notifier: Arc<dyn ContentNotifier> = Arc::new(hub.clone());
        notifier.notify_content_change("blogPost", ContentAction::Delete, json!("post-9"));

        let frames = drain(&mut outbox);
        assert_eq!(frames[0]["contentType"], "blogPost");
        assert_eq!(frames[0]["action"], "delete");
        assert_eq!(frames[0]["data"], "post-9");
    }

    #[test]
    fn test_independent_hubs_do_not_share_channels() {
        let first = BroadcastHub::new();
        let second = BroadcastHub::new();
        let (lease, mut outbox) = first.registry().accept();
        lease.mark_open();

        second.broadcast(&json!({"n": 1}));
        assert!(drain(&mut outbox).is_empty());
        assert_eq!(second.open_channels(), 0);
    }

    #[test]
    fn test_lease_enqueue_is_ordered_with_broadcasts() {
        let hub = BroadcastHub::new();
        let (lease, mut outbox) = hub.registry().accept();
        assert!(lease.enqueue(r#"{"type":"connection","message":"hi"}"#.into()));
        lease.mark_open();
        hub.broadcast(&json!({"n": 1}));

        let frames = drain(&mut outbox);
        assert_eq!(frames[0]["type"], "connection");
        assert_eq!(frames[1], json!({"n": 1}));
    }
}
