//! # folio-api
//!
//! HTTP server for the folio portfolio, carrying the live content channel.
//!
//! - [`hub`]: registry of open channels and the broadcast fan-out
//! - [`channel`]: per-connection handler (welcome, acknowledgments, keepalive)
//! - [`routes`]: router, CORS, and health endpoints
//! - [`config`] / [`logging`]: environment configuration and tracing setup

pub mod channel;
pub mod config;
pub mod hub;
pub mod logging;
pub mod routes;

pub use config::ServerConfig;
pub use hub::{BroadcastHub, ChannelLease, ChannelRegistry};
pub use routes::{router, AppState};
