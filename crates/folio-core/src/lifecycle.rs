//! Channel lifecycle states.
//!
//! Both ends of the live channel track the same four states. The server hub
//! filters broadcast targets on them; the client mirrors them for liveness.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ChannelState {
    /// Whether the channel accepts writes.
    pub fn is_open(self) -> bool {
        matches!(self, ChannelState::Open)
    }

    fn as_u8(self) -> u8 {
        match self {
            ChannelState::Connecting => 0,
            ChannelState::Open => 1,
            ChannelState::Closing => 2,
            ChannelState::Closed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ChannelState::Connecting,
            1 => ChannelState::Open,
            2 => ChannelState::Closing,
            _ => ChannelState::Closed,
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closing => "closing",
            ChannelState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A [`ChannelState`] readable from any task without locking.
///
/// Written by the task that owns the channel, read by the broadcast loop.
#[derive(Debug)]
pub struct AtomicChannelState(AtomicU8);

impl AtomicChannelState {
    pub fn new(state: ChannelState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub fn load(&self) -> ChannelState {
        ChannelState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: ChannelState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

impl Default for AtomicChannelState {
    fn default() -> Self {
        Self::new(ChannelState::Connecting)
    }
}
