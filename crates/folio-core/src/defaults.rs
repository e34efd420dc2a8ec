//! Centralized default constants for folio.
//!
//! Both the server and the client read their fallbacks from here so that the
//! two ends of the live channel agree without restating numbers.

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 5000;

/// Environment name reported by health endpoints when `NODE_ENV` is unset.
pub const ENVIRONMENT: &str = "development";

/// Interval between server keepalive pings on an open channel.
pub const PING_INTERVAL_SECS: u64 = 30;

// =============================================================================
// LIVE CHANNEL MESSAGES
// =============================================================================

/// Text of the one-shot welcome envelope. Clients only key off its `type`.
pub const WELCOME_MESSAGE: &str = "Connected to portfolio server";

/// Text of the acknowledgment sent for each parsed inbound frame.
pub const ACK_MESSAGE: &str = "Message received";

// =============================================================================
// RECONNECT BACKOFF
// =============================================================================

/// First reconnect delay, and the value backoff returns to after an OPEN.
pub const BACKOFF_FLOOR_MS: u64 = 2_000;

/// Upper bound on any reconnect delay.
pub const BACKOFF_CEILING_MS: u64 = 30_000;

/// Origin assumed by a client that was not told where it runs.
pub const CLIENT_ORIGIN: &str = "http://localhost:5000";
