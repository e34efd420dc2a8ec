//! # folio-client
//!
//! Reconnecting live-channel client for folio dashboards.
//!
//! [`LiveClient`] keeps a channel to the folio server open, re-establishing it
//! with exponential backoff whenever it drops, and hands every parsed inbound
//! message to a swappable callback. Liveness is observable through a
//! `tokio::sync::watch` receiver.

pub mod backoff;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod state;
pub mod transport;

pub use backoff::Backoff;
pub use client::{LiveClient, MessageHandler};
pub use config::ClientConfig;
pub use endpoint::resolve_endpoint;
pub use state::{ClientPhase, ReconnectState};
pub use transport::{Connector, Frame, Link, WsConnector};
