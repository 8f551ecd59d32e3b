//! Engine configuration
//!
//! The tick frequency and the target bit rate together fix the half-period
//! HALF, the unit every state of the two machines is timed in:
//!
//! `HALF = (tick_frequency / bit_rate) / 2`

use fugit::HertzU32;

/// Smallest half-period, in ticks, the machines can be timed with.
///
/// The inter-byte pause lasts `HALF - 2` ticks and the stop phases `HALF / 2`
/// ticks; both must be at least two ticks long.
pub const MIN_HALF_PERIOD: u32 = 4;

/// What the orchestrator does when a byte is not acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackPolicy {
    /// Emit a stop condition after the rejected byte and end the transfer
    Abort,
    /// Keep sending the rest of the message, report the first NACK at the end
    Continue,
    /// Stop, then send the whole message again behind a new start, up to
    /// this many more times per transfer. Aborts once they are used up.
    Retry(u8),
}

impl Default for NackPolicy {
    fn default() -> Self {
        NackPolicy::Abort
    }
}

/// Length of the clock-high phase that follows the start condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTiming {
    /// `HALF - 1` ticks: the first ClockLow tick takes the place of the
    /// missing one. Bit-for-bit compatible with existing hardware.
    Compatible,
    /// A full `HALF` ticks, like every other clock phase
    FullHalfPeriod,
}

impl Default for StartTiming {
    fn default() -> Self {
        StartTiming::Compatible
    }
}

/// Configuration of the I2C master, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Rate at which `tick()` is invoked
    pub tick_frequency: HertzU32,
    /// Target SCL frequency
    pub bit_rate: HertzU32,
    pub nack_policy: NackPolicy,
    pub start_timing: StartTiming,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_frequency: HertzU32::MHz(1),
            bit_rate: HertzU32::kHz(100),
            nack_policy: NackPolicy::default(),
            start_timing: StartTiming::default(),
        }
    }
}

impl Config {
    /// Half-period in ticks, `None` if the ratio is unusable.
    pub fn half_period(&self) -> Option<u32> {
        let bit_rate = self.bit_rate.to_Hz();
        if bit_rate == 0 {
            return None;
        }
        let half = self.tick_frequency.to_Hz() / bit_rate / 2;
        (half >= MIN_HALF_PERIOD).then_some(half)
    }

    /// Per-state tick counts, `None` if the ratio is unusable.
    pub fn timing(&self) -> Option<Timing> {
        let half = self.half_period()?;
        Some(Timing {
            half,
            start_clock: match self.start_timing {
                StartTiming::Compatible => half - 1,
                StartTiming::FullHalfPeriod => half,
            },
            quarter: half / 2,
            pause: half - 2,
        })
    }
}

/// Tick counts of every phase, derived from [`Config`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub half: u32,
    /// StartClock phase
    pub start_clock: u32,
    /// StopClock and StopData phases
    pub quarter: u32,
    /// Orchestrator settle time between bytes
    pub pause: u32,
}
