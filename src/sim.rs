//! Test doubles: waveform helpers for pin mocks and a simulated open-drain bus
//! with a slave that acknowledges (or refuses) bytes.

use core::cell::RefCell;
use std::rc::Rc;

use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};
use embedded_hal_mock::eh1::digital::{State as PinState, Transaction as PinTransaction};

/// `'0'`/`'1'` per pin write, in order
pub fn output_waveform(string: &str) -> Vec<PinTransaction> {
    string
        .chars()
        .map(|step| match step {
            '0' => PinTransaction::set(PinState::Low),
            '1' => PinTransaction::set(PinState::High),
            _ => panic!("Invalid binary literal"),
        })
        .collect()
}

/// Bus levels and what the slave made of them
#[derive(Debug)]
pub struct BusModel {
    pub scl: bool,
    master_sda: bool,
    slave_pull: bool,
    bit_count: u8,
    shift: u8,
    in_ack_slot: bool,
    /// Indices (in `received`) of the bytes the slave refuses
    pub nack: Vec<usize>,
    pub received: Vec<u8>,
    /// SDA sampled on every rising SCL edge of a data bit
    pub sampled_bits: Vec<bool>,
    pub starts: usize,
    pub stops: usize,
    /// SCL writes that still succeed before the next one fails
    scl_writes_before_failure: Option<usize>,
}

impl BusModel {
    pub fn sda(&self) -> bool {
        self.master_sda && !self.slave_pull
    }

    fn set_scl(&mut self, level: bool) {
        if level == self.scl {
            return;
        }
        self.scl = level;
        if level {
            self.rising();
        } else {
            self.falling();
        }
    }

    fn set_sda(&mut self, level: bool) {
        let before = self.sda();
        self.master_sda = level;
        let after = self.sda();
        if before == after || !self.scl {
            return;
        }
        // SDA moved while SCL was high
        let partial = self.bit_count as usize;
        let kept = self.sampled_bits.len() - partial;
        self.sampled_bits.truncate(kept);
        self.bit_count = 0;
        self.shift = 0;
        self.in_ack_slot = false;
        if after {
            self.stops += 1;
        } else {
            self.starts += 1;
        }
    }

    fn rising(&mut self) {
        if self.in_ack_slot {
            return;
        }
        let bit = self.sda();
        self.sampled_bits.push(bit);
        self.shift = (self.shift << 1) | bit as u8;
        self.bit_count += 1;
    }

    fn falling(&mut self) {
        if self.in_ack_slot {
            self.in_ack_slot = false;
            self.slave_pull = false;
            self.bit_count = 0;
            self.shift = 0;
        } else if self.bit_count == 8 {
            let index = self.received.len();
            self.received.push(self.shift);
            self.slave_pull = !self.nack.contains(&index);
            self.in_ack_slot = true;
        }
    }
}

/// Shared handle on a [`BusModel`]
#[derive(Clone)]
pub struct SimBus(Rc<RefCell<BusModel>>);

impl SimBus {
    pub fn new() -> Self {
        Self::refusing(&[])
    }

    /// A bus whose slave does not acknowledge the `nack`-th received bytes
    pub fn refusing(nack: &[usize]) -> Self {
        SimBus(Rc::new(RefCell::new(BusModel {
            scl: true,
            master_sda: true,
            slave_pull: false,
            bit_count: 0,
            shift: 0,
            in_ack_slot: false,
            nack: nack.to_vec(),
            received: Vec::new(),
            sampled_bits: Vec::new(),
            starts: 0,
            stops: 0,
            scl_writes_before_failure: None,
        })))
    }

    /// Fail the SCL write following the next `after` ones, once
    pub fn fail_scl_write(&self, after: usize) {
        self.0.borrow_mut().scl_writes_before_failure = Some(after);
    }

    pub fn pins(&self) -> (SimScl, SimSda) {
        (SimScl(self.clone()), SimSda(self.clone()))
    }

    pub fn model(&self) -> std::cell::Ref<'_, BusModel> {
        self.0.borrow()
    }

    /// (SCL, SDA) as seen on the wire
    pub fn levels(&self) -> (bool, bool) {
        let model = self.0.borrow();
        (model.scl, model.sda())
    }
}

pub struct SimScl(SimBus);

pub struct SimSda(SimBus);

impl ErrorType for SimScl {
    type Error = ErrorKind;
}

impl ErrorType for SimSda {
    type Error = ErrorKind;
}

impl SimScl {
    fn drive(&mut self, level: bool) -> Result<(), ErrorKind> {
        let mut model = (self.0).0.borrow_mut();
        if let Some(left) = model.scl_writes_before_failure {
            if left == 0 {
                model.scl_writes_before_failure = None;
                return Err(ErrorKind::Other);
            }
            model.scl_writes_before_failure = Some(left - 1);
        }
        model.set_scl(level);
        Ok(())
    }
}

impl OutputPin for SimScl {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true)
    }
}

impl OutputPin for SimSda {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        (self.0).0.borrow_mut().set_sda(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        (self.0).0.borrow_mut().set_sda(true);
        Ok(())
    }
}

impl InputPin for SimSda {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok((self.0).0.borrow().sda())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!(self.0).0.borrow().sda())
    }
}
