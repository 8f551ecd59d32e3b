//! Phase timer
//!
//! Every state of both machines holds its outputs for a counted number of
//! ticks. [`PhaseTimer`] is the one counter they all share.

/// Counts ticks within one phase, from `0` up to `ticks - 1`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimer {
    count: u32,
}

impl PhaseTimer {
    /// Create a disarmed timer
    pub const fn new() -> Self {
        PhaseTimer { count: 0 }
    }

    /// Advance by one tick of a phase lasting `ticks` ticks.
    ///
    /// Returns `true` on the last tick of the phase and rearms for the next
    /// one. A phase of zero or one tick expires on its first tick.
    pub fn tick(&mut self, ticks: u32) -> bool {
        if self.count + 1 >= ticks {
            self.count = 0;
            true
        } else {
            self.count += 1;
            false
        }
    }

    /// Ticks already spent in the current phase
    pub fn elapsed(&self) -> u32 {
        self.count
    }

    /// Rearm without expiring
    pub fn reset(&mut self) {
        self.count = 0;
    }
}
