//! Tick-driven bitbanged I2C master
//!
//! Drives SCL and SDA of an open-drain bus from two coupled state machines:
//! a [`ByteTransmitter`](transmitter::ByteTransmitter) that clocks out one
//! byte with optional start/stop framing, and a
//! [`MessageOrchestrator`](orchestrator::MessageOrchestrator) that feeds it the
//! bytes of a message and samples the acknowledge bits.
//!
//! [`I2cMaster`] is advanced by the caller, one tick at a time.
//! [`I2cBB`] does the ticking itself on top of an `embedded_hal_async` delay.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod i2c;
pub mod line;
pub mod master;
pub mod orchestrator;
pub mod timer;
pub mod transmitter;

#[cfg(test)]
mod sim;

pub use crate::config::{Config, NackPolicy, StartTiming};
pub use crate::i2c::{Error, I2cBB};
pub use crate::master::I2cMaster;
pub use crate::orchestrator::{Message, Outcome};
