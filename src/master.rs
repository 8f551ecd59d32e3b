//! Tick-driven I2C master
//!
//! [`I2cMaster`] couples the [`MessageOrchestrator`] and the
//! [`ByteTransmitter`] over one pair of [`Lines`]. The caller owns the tick:
//! every call to [`I2cMaster::tick`] advances both machines once, the
//! orchestrator first.
//!
//! ```
//! # use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
//! # struct Pin;
//! # impl ErrorType for Pin { type Error = core::convert::Infallible; }
//! # impl OutputPin for Pin {
//! #     fn set_low(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! #     fn set_high(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl InputPin for Pin {
//! #     fn is_high(&mut self) -> Result<bool, Self::Error> { Ok(false) }
//! #     fn is_low(&mut self) -> Result<bool, Self::Error> { Ok(true) }
//! # }
//! # let (scl, sda) = (Pin, Pin);
//! use bitbang_i2c_master::{Config, I2cMaster, Outcome};
//!
//! let mut master = I2cMaster::new(scl, sda, Config::default());
//! master.write(0x48, &[0x01, 0x60]).unwrap();
//! let outcome = loop {
//!     // one tick per microsecond with the default configuration
//!     if let Some(outcome) = master.tick().unwrap() {
//!         break outcome;
//!     }
//! };
//! assert_eq!(outcome, Outcome::Acknowledged);
//! ```

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::SevenBitAddress;

use crate::config::{Config, Timing};
use crate::i2c::Error;
use crate::line::{Direction, Lines};
use crate::orchestrator::{Message, MessageOrchestrator, Outcome, Phase};
use crate::transmitter::ByteTransmitter;

/// Bit banging I2C master, advanced one tick at a time
pub struct I2cMaster<SCL, SDA> {
    lines: Lines<SCL, SDA>,
    transmitter: ByteTransmitter,
    orchestrator: MessageOrchestrator,
    config: Config,
    timing: Timing,
}

impl<SCL, SDA, E> I2cMaster<SCL, SDA>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
{
    /// Create instance. The lines are driven from the first tick on.
    pub fn new(scl: SCL, sda: SDA, config: Config) -> Self {
        I2cMaster {
            lines: Lines::new(scl, sda),
            transmitter: ByteTransmitter::new(),
            orchestrator: MessageOrchestrator::new(config.nack_policy),
            config,
            timing: Timing::default(),
        }
    }

    /// Begin transmitting `message`.
    ///
    /// Only accepted while no transfer is in progress and the previous stop
    /// condition has been emitted, `Error::Busy` otherwise. Fails with
    /// `Error::InvalidTiming` before touching the lines if the configured
    /// rates give an unusable half-period.
    pub fn start(&mut self, message: Message) -> Result<(), Error<E>> {
        if !self.is_idle() {
            return Err(Error::Busy);
        }
        self.timing = self.config.timing().ok_or(Error::InvalidTiming)?;
        if self.orchestrator.begin(message) {
            Ok(())
        } else {
            Err(Error::Busy)
        }
    }

    /// Begin a write of `output` to the slave at `address`
    pub fn write(&mut self, address: SevenBitAddress, output: &[u8]) -> Result<(), Error<E>> {
        let message = Message::write(address, output).ok_or(Error::InvalidData)?;
        self.start(message)
    }

    /// Begin transmitting `bytes` as they are, address byte first
    pub fn transmit(&mut self, bytes: &[u8]) -> Result<(), Error<E>> {
        let message = Message::new(bytes).ok_or(Error::InvalidData)?;
        self.start(message)
    }

    /// Advance both machines by one tick.
    ///
    /// Returns the outcome on the tick the closing stop condition completes,
    /// exactly once per transfer.
    pub fn tick(&mut self) -> Result<Option<Outcome>, Error<E>> {
        self.orchestrator
            .step(&self.timing, &mut self.transmitter, &mut self.lines)?;
        self.transmitter.step(&self.timing, &mut self.lines)?;

        if self.transmitter.done() {
            Ok(self.orchestrator.take_outcome())
        } else {
            Ok(None)
        }
    }

    /// Abandon any transfer and return the bus to idle: both machines idle,
    /// SDA driven by the master, SCL and SDA high. A transfer cut short is
    /// closed with a stop condition.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        log::debug!("reset");
        self.orchestrator.reset();
        self.transmitter.reset();
        self.lines.idle()
    }

    /// No transfer in progress and the bus released
    pub fn is_idle(&self) -> bool {
        self.orchestrator.is_idle() && self.transmitter.is_idle()
    }

    pub fn phase(&self) -> Phase {
        self.orchestrator.phase()
    }

    pub fn transmitter(&self) -> &ByteTransmitter {
        &self.transmitter
    }

    pub fn direction(&self) -> Direction {
        self.lines.direction()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Release the pins
    pub fn free(self) -> (SCL, SDA) {
        self.lines.free()
    }
}
