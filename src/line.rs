//! Open-drain line interface
//!
//! [`Lines`] owns the SCL and SDA pins. Both are expected to be configured as
//! open-drain outputs with pull-ups, so driving a line high releases it.
//! SDA must also be readable to sample the acknowledge bit.
//!
//! Pins are only written when their level changes.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::i2c::Error;

/// Logic level of a bus line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Level of bit `index` of `byte`
    pub fn of_bit(byte: u8, index: u8) -> Self {
        if (byte >> index) & 0b1 == 1 {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Who drives SDA
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The master drives SDA
    Output,
    /// SDA is released so the slave can drive it
    Input,
}

/// SCL and SDA of one bus
pub struct Lines<SCL, SDA> {
    scl: SCL,
    sda: SDA,
    scl_level: Option<Level>,
    sda_level: Option<Level>,
    sda_out: Level,
    direction: Direction,
}

impl<SCL, SDA, E> Lines<SCL, SDA>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
{
    /// Take ownership of the pins. Nothing is written until the first
    /// [`write`](Lines::write).
    pub fn new(scl: SCL, sda: SDA) -> Self {
        Lines {
            scl,
            sda,
            scl_level: None,
            sda_level: None,
            sda_out: Level::High,
            direction: Direction::Output,
        }
    }

    /// Drive both lines.
    ///
    /// A falling SCL is written before SDA, anything else after it, so that
    /// SDA never moves while SCL is high within one call.
    pub fn write(&mut self, scl: Level, sda: Level) -> Result<(), Error<E>> {
        self.sda_out = sda;
        if scl == Level::Low {
            self.set_scl(scl)?;
            self.apply_sda()
        } else {
            self.apply_sda()?;
            self.set_scl(scl)
        }
    }

    /// Hand SDA to the slave (`Input`) or take it back (`Output`).
    ///
    /// Taking it back drives the level last requested by [`write`](Lines::write).
    pub fn set_direction(&mut self, direction: Direction) -> Result<(), Error<E>> {
        self.direction = direction;
        self.apply_sda()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Sample SDA as seen on the bus
    pub fn read_sda(&mut self) -> Result<Level, Error<E>> {
        if self.sda.is_low().map_err(Error::Bus)? {
            Ok(Level::Low)
        } else {
            Ok(Level::High)
        }
    }

    /// Return to the idle bus: direction `Output`, both lines rewritten high
    /// whatever was written before.
    ///
    /// If a line was left low, or SDA handed to the slave, a stop condition
    /// is emitted first so that the slave drops the transaction.
    pub fn idle(&mut self) -> Result<(), Error<E>> {
        let busy = self.scl_level == Some(Level::Low)
            || self.sda_level == Some(Level::Low)
            || self.direction == Direction::Input;
        self.direction = Direction::Output;
        if busy {
            log::debug!("stop condition before idle");
            self.write(Level::Low, Level::Low)?;
            self.write(Level::High, Level::Low)?;
            self.write(Level::High, Level::High)?;
        }

        self.scl_level = None;
        self.sda_level = None;
        self.direction = Direction::Output;
        self.write(Level::High, Level::High)
    }

    /// Release the pins
    pub fn free(self) -> (SCL, SDA) {
        (self.scl, self.sda)
    }

    #[inline]
    fn apply_sda(&mut self) -> Result<(), Error<E>> {
        let level = match self.direction {
            Direction::Output => self.sda_out,
            Direction::Input => Level::High,
        };
        if self.sda_level != Some(level) {
            match level {
                Level::High => self.sda.set_high(),
                Level::Low => self.sda.set_low(),
            }
            .map_err(Error::Bus)?;
            self.sda_level = Some(level);
        }
        Ok(())
    }

    #[inline]
    fn set_scl(&mut self, level: Level) -> Result<(), Error<E>> {
        if self.scl_level != Some(level) {
            match level {
                Level::High => self.scl.set_high(),
                Level::Low => self.scl.set_low(),
            }
            .map_err(Error::Bus)?;
            self.scl_level = Some(level);
        }
        Ok(())
    }
}
