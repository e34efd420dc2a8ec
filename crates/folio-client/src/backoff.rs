//! Exponential reconnect backoff.

use std::time::Duration;

use folio_core::defaults;

/// Doubling delay between a floor and a ceiling.
///
/// The delay only returns to the floor through [`Backoff::reset`], which the
/// client calls on a confirmed open. Repeated failures keep climbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(defaults::BACKOFF_FLOOR_MS),
            Duration::from_millis(defaults::BACKOFF_CEILING_MS),
        )
    }
}

impl Backoff {
    /// A ceiling below the floor is raised to the floor.
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn delay(&self) -> Duration {
        self.current.min(self.ceiling)
    }

    /// Double the delay, capped at the ceiling.
    pub fn advance(&mut self) {
        self.current = self.current.saturating_mul(2).min(self.ceiling);
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }
}
