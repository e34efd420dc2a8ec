//! Live channel wire protocol.
//!
//! Every frame is a JSON text message with a `type` tag. Field names are the
//! contract; field order is not.
//!
//! | direction | `type` | body |
//! |-----------|--------|------|
//! | server → client | `connection` | `message` (once, right after open) |
//! | server → client | `acknowledgment` | `message` (per parsed inbound frame) |
//! | server → client | `content_update` | `contentType`, `action`, `data`, `timestamp` |
//! | client → server | any | any JSON value |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults;
use crate::error::Result;
use crate::events::{ChangeEvent, ContentAction};

/// A frame sent by the server on a live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One-shot greeting confirming the channel is live end to end.
    Connection { message: String },
    /// Receipt for a client frame that parsed as JSON.
    Acknowledgment { message: String },
    /// A content collection changed.
    ContentUpdate(ChangeEvent),
}

impl ServerMessage {
    pub const CONNECTION: &'static str = "connection";
    pub const ACKNOWLEDGMENT: &'static str = "acknowledgment";
    pub const CONTENT_UPDATE: &'static str = "content_update";

    /// The welcome frame sent when a channel opens.
    pub fn welcome() -> Self {
        ServerMessage::Connection {
            message: defaults::WELCOME_MESSAGE.to_string(),
        }
    }

    /// The receipt sent for a parsed inbound frame.
    pub fn acknowledgment() -> Self {
        ServerMessage::Acknowledgment {
            message: defaults::ACK_MESSAGE.to_string(),
        }
    }

    /// Wrap a fresh change event stamped with the current time.
    pub fn content_update(
        content_type: impl Into<String>,
        action: ContentAction,
        data: Value,
    ) -> Self {
        ServerMessage::ContentUpdate(ChangeEvent::new(content_type, action, data))
    }

    /// Value of the `type` tag this frame carries.
    pub fn message_type(&self) -> &'static str {
        match self {
            ServerMessage::Connection { .. } => Self::CONNECTION,
            ServerMessage::Acknowledgment { .. } => Self::ACKNOWLEDGMENT,
            ServerMessage::ContentUpdate(_) => Self::CONTENT_UPDATE,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a raw text frame.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Interpret an already-parsed frame, as handed to client callbacks.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
