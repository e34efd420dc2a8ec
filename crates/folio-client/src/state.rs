//! Reconnect bookkeeping for the live client.
//!
//! [`ReconnectState`] holds no I/O. The driver task consults it at every
//! transition, which keeps the re-entrancy and single-timer rules testable
//! without sockets or clocks.

use std::fmt;
use std::time::Duration;

use crate::backoff::Backoff;

/// Observable phase of the client's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// No attempt made yet.
    Idle,
    Connecting,
    Open,
    /// Disconnected; a reconnect may be pending.
    Closed,
}

impl fmt::Display for ClientPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClientPhase::Idle => "idle",
            ClientPhase::Connecting => "connecting",
            ClientPhase::Open => "open",
            ClientPhase::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct ReconnectState {
    backoff: Backoff,
    phase: ClientPhase,
    connecting: bool,
    timer_pending: bool,
    torn_down: bool,
}

impl ReconnectState {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            backoff,
            phase: ClientPhase::Idle,
            connecting: false,
            timer_pending: false,
            torn_down: false,
        }
    }

    /// Claim the right to start a connection attempt.
    ///
    /// Returns `false` while another attempt is in flight or after teardown.
    pub fn begin_connect(&mut self) -> bool {
        if self.torn_down || self.connecting {
            return false;
        }
        self.connecting = true;
        self.phase = ClientPhase::Connecting;
        true
    }

    /// Record a confirmed open. Resets the backoff to its floor.
    ///
    /// Returns `false` if the client was torn down while the attempt was in
    /// flight; the caller should close the new channel immediately.
    pub fn on_open(&mut self) -> bool {
        self.connecting = false;
        if self.torn_down {
            return false;
        }
        self.phase = ClientPhase::Open;
        self.backoff.reset();
        true
    }

    /// Record a close (or a failed attempt) and schedule the reconnect.
    ///
    /// Returns the delay to wait, or `None` if torn down or a reconnect is
    /// already pending.
    pub fn on_close(&mut self) -> Option<Duration> {
        self.connecting = false;
        self.phase = ClientPhase::Closed;
        self.schedule_reconnect()
    }

    /// At most one reconnect timer is ever pending.
    pub fn schedule_reconnect(&mut self) -> Option<Duration> {
        if self.torn_down || self.timer_pending {
            return None;
        }
        self.timer_pending = true;
        Some(self.backoff.delay())
    }

    /// The reconnect timer elapsed. Doubles the backoff for the attempt after
    /// this one and reports whether a new attempt should start.
    pub fn on_timer_fired(&mut self) -> bool {
        if !self.timer_pending || self.torn_down {
            return false;
        }
        self.timer_pending = false;
        self.backoff.advance();
        true
    }

    /// Stop for good. Returns `true` only for the first call.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        self.timer_pending = false;
        self.connecting = false;
        self.phase = ClientPhase::Closed;
        true
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn is_live(&self) -> bool {
        self.phase == ClientPhase::Open && !self.torn_down
    }

    pub fn is_timer_pending(&self) -> bool {
        self.timer_pending
    }

    /// Delay the next scheduled reconnect would use.
    pub fn current_backoff(&self) -> Duration {
        self.backoff.delay()
    }
}

impl Default for ReconnectState {
    fn default() -> Self {
        Self::new(Backoff::default())
    }
}
