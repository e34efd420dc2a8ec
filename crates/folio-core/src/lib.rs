//! # folio-core
//!
//! Shared types for the folio live content channel.
//!
//! This crate defines the wire contract spoken between the API server and
//! every connected dashboard: the server message envelopes, the
//! `content_update` change event, the channel lifecycle states, and the
//! notifier trait that REST mutation handlers call after a durable write.

pub mod defaults;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod protocol;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{content_types, ChangeEvent, ContentAction, ContentNotifier};
pub use lifecycle::{AtomicChannelState, ChannelState};
pub use protocol::ServerMessage;
