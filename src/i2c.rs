/*!
# Asynchronous driver for the tick-driven I2C master

[`I2cBB`] runs an [`I2cMaster`] to completion, awaiting one tick period of an
`embedded_hal_async` delay between ticks. It consumes the following hardware
resources:
- A delay provider to mark ticks
- Two GPIO pins for SDA and SCL lines.

[`I2cBB`] implements the `embedded_hal_async` [`I2c`] trait. Only writes are
supported, and slaves may not stretch the clock.

## Hardware requirements

1. Configure GPIO pins as Open-Drain outputs.
2. Pick a tick frequency at least eight times the bit rate (see [`Config`]).

## Example

```no_run
# use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
# use embedded_hal_async::delay::DelayNs;
# struct Pin;
# impl ErrorType for Pin { type Error = core::convert::Infallible; }
# impl OutputPin for Pin {
#     fn set_low(&mut self) -> Result<(), Self::Error> { Ok(()) }
#     fn set_high(&mut self) -> Result<(), Self::Error> { Ok(()) }
# }
# impl InputPin for Pin {
#     fn is_high(&mut self) -> Result<bool, Self::Error> { Ok(false) }
#     fn is_low(&mut self) -> Result<bool, Self::Error> { Ok(true) }
# }
# struct Delay;
# impl DelayNs for Delay { async fn delay_ns(&mut self, _ns: u32) {} }
# async fn demo() {
# let (scl, sda, delay) = (Pin, Pin, Delay);
use bitbang_i2c_master::{Config, I2cBB};
use embedded_hal_async::i2c::I2c;
use fugit::RateExtU32;

let config = Config {
    tick_frequency: 4.MHz(),
    bit_rate: 400.kHz(),
    ..Default::default()
};
let mut i2c = I2cBB::new(scl, sda, delay, config);
// LM75: configuration register, shutdown bit
i2c.write(0x48, &[0x01, 0x01]).await.unwrap();
# }
```
*/

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation, SevenBitAddress};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use fugit::NanosDurationU32;

use crate::config::Config;
use crate::master::I2cMaster;
use crate::orchestrator::{Message, Outcome};

/// I2C error
#[derive(Debug, Eq, PartialEq)]
pub enum Error<E> {
    /// GPIO error
    Bus(E),
    /// No ack received
    NoAck(NoAcknowledgeSource),
    /// Invalid input
    InvalidData,
    /// Tick frequency too low for the bit rate
    InvalidTiming,
    /// A transfer is already in progress
    Busy,
}

impl<E: core::fmt::Debug> embedded_hal::i2c::Error for Error<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Bus(_) => ErrorKind::Bus,
            Error::NoAck(source) => ErrorKind::NoAcknowledge(*source),
            Error::InvalidData | Error::InvalidTiming | Error::Busy => ErrorKind::Other,
        }
    }
}

/// Bit banging I2C device
pub struct I2cBB<SCL, SDA, DELAY>
where
    SCL: OutputPin,
    SDA: OutputPin + InputPin,
    DELAY: DelayNs,
{
    master: I2cMaster<SCL, SDA>,
    delay: DELAY,
}

impl<SCL, SDA, DELAY, E> I2cBB<SCL, SDA, DELAY>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    DELAY: DelayNs,
{
    /// Create instance
    pub fn new(scl: SCL, sda: SDA, delay: DELAY, config: Config) -> Self {
        I2cBB {
            master: I2cMaster::new(scl, sda, config),
            delay,
        }
    }

    /// Send `message` and report how the slave answered.
    ///
    /// **This is a low-level control function.** A refused byte is not an
    /// error here; the [`I2c`] methods turn it into one.
    ///
    /// A transfer left unfinished by a dropped future is closed first. On a
    /// bus error the lines are returned to idle before the error is reported.
    pub async fn transfer(&mut self, message: Message) -> Result<Outcome, Error<E>> {
        if !self.master.is_idle() {
            self.master.reset()?;
        }
        self.master.start(message)?;
        // start() has validated the tick frequency
        let tick: NanosDurationU32 = self.master.config().tick_frequency.into_duration();

        loop {
            match self.master.tick() {
                Ok(Some(outcome)) => return Ok(outcome),
                Ok(None) => {}
                Err(error) => {
                    // the bus error is the one worth reporting
                    let _ = self.master.reset();
                    return Err(error);
                }
            }
            self.delay.delay_ns(tick.to_nanos()).await;
        }
    }

    /// Abandon a transfer interrupted by a bus error and idle the lines
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.master.reset()
    }

    /// Release the pins and the delay
    pub fn free(self) -> (SCL, SDA, DELAY) {
        let (scl, sda) = self.master.free();
        (scl, sda, self.delay)
    }

    async fn send(&mut self, message: Message) -> Result<(), Error<E>> {
        match self.transfer(message).await? {
            Outcome::Acknowledged => Ok(()),
            Outcome::NotAcknowledged { source, .. } => Err(Error::NoAck(source)),
        }
    }
}

impl<SCL, SDA, DELAY, E> ErrorType for I2cBB<SCL, SDA, DELAY>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    DELAY: DelayNs,
    E: core::fmt::Debug,
{
    type Error = crate::i2c::Error<E>;
}

/// Write-only: any operation reading from the slave fails with
/// [`Error::InvalidData`] before touching the bus.
impl<SCL, SDA, DELAY, E> I2c for I2cBB<SCL, SDA, DELAY>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    DELAY: DelayNs,
    E: core::fmt::Debug,
{
    async fn read(&mut self, _address: u8, _input: &mut [u8]) -> Result<(), Self::Error> {
        Err(Error::InvalidData)
    }

    async fn write(&mut self, address: u8, output: &[u8]) -> Result<(), Self::Error> {
        // ST, SAD + W, output, SP
        let message = Message::write(address, output).ok_or(Error::InvalidData)?;
        self.send(message).await
    }

    async fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        // adjacent writes share one frame, so the whole transaction is one message
        let mut message = Message::write(address, &[]).ok_or(Error::InvalidData)?;
        for operation in operations.iter() {
            match operation {
                Operation::Write(bytes) => {
                    if !message.extend(bytes) {
                        return Err(Error::InvalidData);
                    }
                }
                Operation::Read(_) => return Err(Error::InvalidData),
            }
        }
        self.send(message).await
    }
}
