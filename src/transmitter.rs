//! Byte transmitter
//!
//! Serializes one byte onto SDA, most significant bit first, with the clock
//! phasing of a standard I2C master. The byte can be framed by a start
//! condition before it and a stop condition after it.
//!
//! Every call to [`ByteTransmitter::step`] is one tick. The machine is Moore
//! style: a step drives the outputs of the current state, then counts the
//! tick and possibly moves to the next state, whose outputs appear on the
//! following tick.
//!
//! ```text
//!        Idle --enable--> StartData -> StartClock --.
//!          |                                        v
//!          '------enable, no start------------> ClockLow <-----------.
//!                                                   |                |
//!                                               ClockHigh --(bits)---'
//!                                                   |
//!                                                WaitAck -> ReadAck --(no stop)--> ClockLow
//!                                                              |
//!                          Idle <- StopData <- StopClock <- PreStop
//! ```

use embedded_hal::digital::{InputPin, OutputPin};

use crate::config::Timing;
use crate::i2c::Error;
use crate::line::{Level, Lines};
use crate::timer::PhaseTimer;

/// States of the byte transmitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Bus idle, both lines high, waiting for enable
    Idle,
    /// SDA and SCL high before the start condition
    StartData,
    /// SDA pulled low under a high SCL (the start condition)
    StartClock,
    /// SCL low, data bit driven onto SDA
    ClockLow,
    /// SCL high, slave samples the data bit
    ClockHigh,
    /// SCL low, SDA released for the acknowledge bit
    WaitAck,
    /// SCL high on the ninth clock, acknowledge bit is valid
    ReadAck,
    /// SCL and SDA low ahead of the stop condition
    PreStop,
    /// SCL released, SDA still low
    StopClock,
    /// SDA released under a high SCL (the stop condition)
    StopData,
}

/// Start/stop framing requested for the byte being loaded
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Framing {
    /// Emit a start condition before the byte
    pub start: bool,
    /// Emit a stop condition after the byte's acknowledge bit
    pub stop: bool,
}

/// Per-byte progress, reset when a byte begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitTransferState {
    /// Bits of the byte not clocked out yet
    pub bits_left: u8,
    /// Bit latched at the end of ClockLow, held through ClockHigh
    pub current_bit: Level,
    timer: PhaseTimer,
}

impl BitTransferState {
    const fn new() -> Self {
        BitTransferState {
            bits_left: 8,
            current_bit: Level::High,
            timer: PhaseTimer::new(),
        }
    }
}

/// The byte transmitter state machine
#[derive(Debug)]
pub struct ByteTransmitter {
    state: TxState,
    bits: BitTransferState,
    // input register, written by the orchestrator
    byte: u8,
    framing: Framing,
    enable: bool,
    // level signals, recomputed on every step
    ack_ready: bool,
    ack_clock: bool,
    done: bool,
}

impl Default for ByteTransmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteTransmitter {
    pub const fn new() -> Self {
        ByteTransmitter {
            state: TxState::Idle,
            bits: BitTransferState::new(),
            byte: 0,
            framing: Framing {
                start: false,
                stop: false,
            },
            enable: false,
            ack_ready: false,
            ack_clock: false,
            done: false,
        }
    }

    /// Load the next byte and its framing.
    ///
    /// The byte is read bit by bit during ClockLow, so it may be loaded up to
    /// the end of the first ClockLow phase of that byte.
    pub fn load(&mut self, byte: u8, framing: Framing) {
        self.byte = byte;
        self.framing = framing;
    }

    /// Level of the enable input. Only sampled in `Idle`.
    pub fn set_enable(&mut self, enable: bool) {
        self.enable = enable;
    }

    /// Change whether a stop condition follows the byte in flight. Takes
    /// effect if set before the end of ReadAck.
    pub fn set_stop(&mut self, stop: bool) {
        self.framing.stop = stop;
    }

    /// SDA should be released for the slave's acknowledge bit
    pub fn ack_ready(&self) -> bool {
        self.ack_ready
    }

    /// SCL is high on the acknowledge clock, SDA may be sampled
    pub fn ack_clock(&self) -> bool {
        self.ack_clock
    }

    /// The stop condition has been emitted, the bus is idle again
    pub fn done(&self) -> bool {
        self.done
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn is_idle(&self) -> bool {
        self.state == TxState::Idle
    }

    /// Index of the bit on SDA while a data bit is being clocked
    pub fn bit_index(&self) -> Option<u8> {
        match self.state {
            TxState::ClockLow => Some(self.bits.bits_left - 1),
            TxState::ClockHigh => Some(self.bits.bits_left),
            _ => None,
        }
    }

    /// Back to `Idle` with a cleared input register. Lines are not touched.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Advance by one tick
    pub fn step<SCL, SDA, E>(
        &mut self,
        timing: &Timing,
        lines: &mut Lines<SCL, SDA>,
    ) -> Result<(), Error<E>>
    where
        SCL: OutputPin<Error = E>,
        SDA: OutputPin<Error = E> + InputPin<Error = E>,
    {
        self.ack_ready = false;
        self.ack_clock = false;
        self.done = false;

        match self.state {
            TxState::Idle => {
                lines.write(Level::High, Level::High)?;
                if self.enable {
                    self.bits = BitTransferState::new();
                    if self.framing.start {
                        self.goto(TxState::StartData);
                    } else {
                        self.goto(TxState::ClockLow);
                    }
                }
            }
            TxState::StartData => {
                lines.write(Level::High, Level::High)?;
                if self.bits.timer.tick(timing.half) {
                    self.goto(TxState::StartClock);
                }
            }
            TxState::StartClock => {
                lines.write(Level::High, Level::Low)?;
                if self.bits.timer.tick(timing.start_clock) {
                    self.goto(TxState::ClockLow);
                }
            }
            TxState::ClockLow => {
                let bit = Level::of_bit(self.byte, self.bits.bits_left - 1);
                lines.write(Level::Low, bit)?;
                if self.bits.timer.tick(timing.half) {
                    self.bits.current_bit = bit;
                    self.bits.bits_left -= 1;
                    self.goto(TxState::ClockHigh);
                }
            }
            TxState::ClockHigh => {
                lines.write(Level::High, self.bits.current_bit)?;
                if self.bits.timer.tick(timing.half) {
                    if self.bits.bits_left == 0 {
                        self.goto(TxState::WaitAck);
                    } else {
                        self.goto(TxState::ClockLow);
                    }
                }
            }
            TxState::WaitAck => {
                lines.write(Level::Low, Level::High)?;
                let expired = self.bits.timer.tick(timing.half);
                self.ack_ready = !expired;
                if expired {
                    self.goto(TxState::ReadAck);
                }
            }
            TxState::ReadAck => {
                lines.write(Level::High, Level::High)?;
                let expired = self.bits.timer.tick(timing.half);
                self.ack_clock = !expired;
                if expired {
                    self.bits.bits_left = 8;
                    if self.framing.stop {
                        self.goto(TxState::PreStop);
                    } else {
                        self.goto(TxState::ClockLow);
                    }
                }
            }
            TxState::PreStop => {
                lines.write(Level::Low, Level::Low)?;
                if self.bits.timer.tick(timing.half) {
                    self.goto(TxState::StopClock);
                }
            }
            TxState::StopClock => {
                lines.write(Level::High, Level::Low)?;
                if self.bits.timer.tick(timing.quarter) {
                    self.goto(TxState::StopData);
                }
            }
            TxState::StopData => {
                lines.write(Level::High, Level::High)?;
                if self.bits.timer.tick(timing.quarter) {
                    self.done = true;
                    self.goto(TxState::Idle);
                }
            }
        }
        Ok(())
    }

    #[inline]
    fn goto(&mut self, next: TxState) {
        log::trace!("transmitter {:?} -> {:?}", self.state, next);
        self.bits.timer.reset();
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sim::{output_waveform, SimBus};
    use embedded_hal_mock::eh1::digital::Mock as PinMock;

    fn timing() -> Timing {
        Config::default().timing().unwrap()
    }

    /// Steps until `done`, returns the number of steps taken
    fn run<SCL, SDA, E>(tx: &mut ByteTransmitter, lines: &mut Lines<SCL, SDA>) -> usize
    where
        SCL: OutputPin<Error = E>,
        SDA: OutputPin<Error = E> + InputPin<Error = E>,
        E: core::fmt::Debug,
    {
        let timing = timing();
        for steps in 1..1000 {
            tx.step(&timing, lines).unwrap();
            if tx.done() {
                return steps;
            }
        }
        panic!("transmitter never finished");
    }

    #[test]
    fn framed_byte_waveform() {
        // idle, then one SCL pulse per bit, the acknowledge clock and the stop clock
        let scl = PinMock::new(&output_waveform("101010101010101010101"));
        // idle, start, the level changes of 0xA5, stop setup, stop
        let sda = PinMock::new(&output_waveform("10101010101"));
        let mut lines = Lines::new(scl, sda);

        let mut tx = ByteTransmitter::new();
        tx.load(
            0xA5,
            Framing {
                start: true,
                stop: true,
            },
        );
        tx.set_enable(true);
        run(&mut tx, &mut lines);
        assert!(tx.is_idle());

        let (mut scl, mut sda) = lines.free();
        scl.done();
        sda.done();
    }

    #[test]
    fn framed_byte_tick_count() {
        let bus = SimBus::new();
        let (scl, sda) = bus.pins();
        let mut lines = Lines::new(scl, sda);

        let mut tx = ByteTransmitter::new();
        tx.load(
            0x3C,
            Framing {
                start: true,
                stop: true,
            },
        );
        tx.set_enable(true);

        // Idle, start (5 + 4), 8 bits, ack clock, stop (5 + 2 + 2)
        assert_eq!(run(&mut tx, &mut lines), 1 + 9 + 80 + 10 + 9);
        assert_eq!(bus.model().received, vec![0x3C]);
        assert_eq!(bus.model().starts, 1);
        assert_eq!(bus.model().stops, 1);
    }

    #[test]
    fn bits_are_sampled_msb_first() {
        let bus = SimBus::new();
        let (scl, sda) = bus.pins();
        let mut lines = Lines::new(scl, sda);

        let mut tx = ByteTransmitter::new();
        tx.load(
            0xA5,
            Framing {
                start: true,
                stop: true,
            },
        );
        tx.set_enable(true);
        run(&mut tx, &mut lines);

        assert_eq!(
            bus.model().sampled_bits,
            vec![true, false, true, false, false, true, false, true]
        );
    }

    #[test]
    fn bit_index_counts_down_once() {
        let bus = SimBus::new();
        let (scl, sda) = bus.pins();
        let mut lines = Lines::new(scl, sda);
        let timing = timing();

        let mut tx = ByteTransmitter::new();
        tx.load(0x81, Framing::default());
        tx.set_enable(true);

        let mut seen: Vec<u8> = Vec::new();
        while tx.state() != TxState::WaitAck {
            tx.step(&timing, &mut lines).unwrap();
            if let Some(index) = tx.bit_index() {
                if seen.last() != Some(&index) {
                    seen.push(index);
                }
            }
        }
        assert_eq!(seen, vec![7, 6, 5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn sda_only_moves_while_scl_is_low() {
        let bus = SimBus::new();
        let (scl, sda) = bus.pins();
        let mut lines = Lines::new(scl, sda);
        let timing = timing();

        let mut tx = ByteTransmitter::new();
        tx.load(0b0110_1001, Framing::default());
        tx.set_enable(true);

        let mut previous = bus.levels();
        while tx.state() != TxState::WaitAck {
            tx.step(&timing, &mut lines).unwrap();
            let current = bus.levels();
            if previous.1 != current.1 {
                assert!(!current.0, "SDA changed under a high SCL");
            }
            previous = current;
        }
        assert_eq!(bus.model().starts, 0);
    }

    #[test]
    fn ack_signals_follow_the_ninth_clock() {
        let bus = SimBus::new();
        let (scl, sda) = bus.pins();
        let mut lines = Lines::new(scl, sda);
        let timing = timing();

        let mut tx = ByteTransmitter::new();
        tx.load(0x00, Framing::default());
        tx.set_enable(true);

        let mut ready = 0;
        let mut clock = 0;
        // one byte without framing: enable tick, 8 bits, acknowledge clock
        for _ in 0..(1 + 18 * timing.half) {
            tx.step(&timing, &mut lines).unwrap();
            if tx.ack_ready() {
                assert_eq!(tx.state(), TxState::WaitAck);
                assert!(!bus.levels().0);
                ready += 1;
            }
            if tx.ack_clock() {
                assert_eq!(tx.state(), TxState::ReadAck);
                assert!(bus.levels().0);
                clock += 1;
            }
        }
        // signals are lowered on the last tick of their phase
        assert_eq!(ready, timing.half - 1);
        assert_eq!(clock, timing.half - 1);
        assert_eq!(tx.state(), TxState::ClockLow);
        assert!(!tx.done());
    }
}
