//! Message orchestrator
//!
//! Feeds the bytes of one [`Message`] to the [`ByteTransmitter`], framing the
//! first with a start condition and the last with a stop condition, and samples
//! the slave's acknowledge bit after each of them.
//!
//! One pass per byte: `Setup -> Send -> WaitAck -> ReadAck -> Pause`, then
//! `Setup` again or `Idle` once no byte remains. A retried message is sent
//! again from its first byte after a stop condition, so `Setup` holds a
//! start-framed byte until the transmitter is idle.

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::{NoAcknowledgeSource, SevenBitAddress};

use crate::config::{NackPolicy, Timing};
use crate::i2c::Error;
use crate::line::{Direction, Level, Lines};
use crate::timer::PhaseTimer;
use crate::transmitter::{ByteTransmitter, Framing};

/// Largest message, address byte included
pub const MAX_MESSAGE_LEN: usize = 255;

/// Bytes sent to one slave in one transfer, address byte first.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Message {
    bytes: [u8; MAX_MESSAGE_LEN],
    len: usize,
}

impl Message {
    /// Raw message. The first byte is sent as is, so it must already hold the
    /// 7-bit address shifted left with the R/W bit in bit 0.
    ///
    /// `None` if `bytes` is empty or longer than [`MAX_MESSAGE_LEN`].
    pub fn new(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() > MAX_MESSAGE_LEN {
            return None;
        }
        let mut message = Message {
            bytes: [0; MAX_MESSAGE_LEN],
            len: bytes.len(),
        };
        message.bytes[..bytes.len()].copy_from_slice(bytes);
        Some(message)
    }

    /// Write of `payload` to `address`
    ///
    /// `None` if the address does not fit in 7 bits or the payload is too long.
    pub fn write(address: SevenBitAddress, payload: &[u8]) -> Option<Self> {
        if address > 0x7F || payload.len() >= MAX_MESSAGE_LEN {
            return None;
        }
        let mut message = Message {
            bytes: [0; MAX_MESSAGE_LEN],
            len: payload.len() + 1,
        };
        // SAD + W
        message.bytes[0] = (address << 1) | 0x0;
        message.bytes[1..message.len].copy_from_slice(payload);
        Some(message)
    }

    /// Append `bytes`. `false` and unchanged if they do not fit.
    pub fn extend(&mut self, bytes: &[u8]) -> bool {
        let end = self.len + bytes.len();
        if end > MAX_MESSAGE_LEN {
            return false;
        }
        self.bytes[self.len..end].copy_from_slice(bytes);
        self.len = end;
        true
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`, messages hold at least the address byte
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl core::fmt::Debug for Message {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Message").field(&self.as_bytes()).finish()
    }
}

/// How a transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every byte was acknowledged
    Acknowledged,
    /// The byte at `index` was given up on. It is the first such byte; with
    /// [`NackPolicy::Continue`] the rest of the message was still sent.
    NotAcknowledged {
        index: usize,
        source: NoAcknowledgeSource,
    },
}

/// Phases of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Load the next byte into the transmitter
    Setup,
    /// Enable pulse
    Send,
    /// Wait for the transmitter to release SDA
    WaitAck,
    /// Sample the acknowledge bit
    ReadAck,
    /// Settle between bytes
    Pause,
    /// No transfer in progress
    Idle,
}

/// Bookkeeping of the transfer in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferState {
    message: Message,
    /// Bytes not done with yet
    pub remaining_bytes: usize,
    pub current_byte: u8,
    /// Acknowledge bit of the last byte
    pub ack_received: bool,
    issued: usize,
    retries_left: u8,
    first_nack: Option<usize>,
}

impl TransferState {
    fn new(message: Message, policy: NackPolicy) -> Self {
        TransferState {
            remaining_bytes: message.len(),
            message,
            current_byte: 0,
            ack_received: false,
            issued: 0,
            retries_left: retry_budget(policy),
            first_nack: None,
        }
    }

    /// Position of the byte being sent
    pub fn index(&self) -> usize {
        self.message.len() - self.remaining_bytes
    }

    /// Nothing has been handed to the transmitter since the last start
    pub fn is_first_byte(&self) -> bool {
        self.issued == 0
    }

    pub fn is_last_byte(&self) -> bool {
        self.remaining_bytes == 1
    }

    fn outcome(&self) -> Outcome {
        match self.first_nack {
            None => Outcome::Acknowledged,
            Some(index) => Outcome::NotAcknowledged {
                index,
                source: if index == 0 {
                    NoAcknowledgeSource::Address
                } else {
                    NoAcknowledgeSource::Data
                },
            },
        }
    }
}

fn retry_budget(policy: NackPolicy) -> u8 {
    match policy {
        NackPolicy::Retry(attempts) => attempts,
        _ => 0,
    }
}

/// The message orchestrator state machine
#[derive(Debug)]
pub struct MessageOrchestrator {
    phase: Phase,
    policy: NackPolicy,
    timer: PhaseTimer,
    transfer: Option<TransferState>,
    outcome: Option<Outcome>,
}

impl MessageOrchestrator {
    pub fn new(policy: NackPolicy) -> Self {
        MessageOrchestrator {
            phase: Phase::Idle,
            policy,
            timer: PhaseTimer::new(),
            transfer: None,
            outcome: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// The transfer in progress, if any
    pub fn transfer(&self) -> Option<&TransferState> {
        self.transfer.as_ref()
    }

    /// Begin a transfer. Returns `false` and changes nothing unless idle.
    pub fn begin(&mut self, message: Message) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        log::debug!("transfer of {} bytes", message.len());
        self.transfer = Some(TransferState::new(message, self.policy));
        self.outcome = None;
        self.timer.reset();
        self.goto(Phase::Setup);
        true
    }

    /// Outcome of the last finished transfer, taken once
    pub fn take_outcome(&mut self) -> Option<Outcome> {
        self.outcome.take()
    }

    /// Drop the transfer in progress
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.timer.reset();
        self.transfer = None;
        self.outcome = None;
    }

    /// Advance by one tick. Reads the transmitter's signals as left by its
    /// previous step, so it must run before the transmitter within a tick.
    pub fn step<SCL, SDA, E>(
        &mut self,
        timing: &Timing,
        tx: &mut ByteTransmitter,
        lines: &mut Lines<SCL, SDA>,
    ) -> Result<(), Error<E>>
    where
        SCL: OutputPin<Error = E>,
        SDA: OutputPin<Error = E> + InputPin<Error = E>,
    {
        let Some(transfer) = self.transfer.as_mut() else {
            tx.set_enable(false);
            return Ok(());
        };

        let next = match self.phase {
            Phase::Setup if transfer.is_first_byte() && !tx.is_idle() => None,
            Phase::Setup => {
                transfer.current_byte = transfer.message.as_bytes()[transfer.index()];
                tx.load(
                    transfer.current_byte,
                    Framing {
                        start: transfer.is_first_byte(),
                        stop: transfer.is_last_byte(),
                    },
                );
                transfer.issued += 1;
                lines.set_direction(Direction::Output)?;
                Some(Phase::Send)
            }
            Phase::Send => {
                tx.set_enable(true);
                Some(Phase::WaitAck)
            }
            Phase::WaitAck => {
                tx.set_enable(false);
                if tx.ack_ready() {
                    lines.set_direction(Direction::Input)?;
                    Some(Phase::ReadAck)
                } else {
                    None
                }
            }
            Phase::ReadAck => {
                if tx.ack_clock() {
                    let ack = lines.read_sda()? == Level::Low;
                    lines.set_direction(Direction::Output)?;
                    transfer.ack_received = ack;
                    if ack {
                        transfer.remaining_bytes -= 1;
                    } else {
                        not_acknowledged(self.policy, transfer, tx);
                    }
                    Some(Phase::Pause)
                } else {
                    None
                }
            }
            Phase::Pause => {
                if !self.timer.tick(timing.pause) {
                    None
                } else if transfer.remaining_bytes == 0 {
                    let outcome = transfer.outcome();
                    log::debug!("transfer finished: {:?}", outcome);
                    self.outcome = Some(outcome);
                    self.transfer = None;
                    Some(Phase::Idle)
                } else {
                    Some(Phase::Setup)
                }
            }
            Phase::Idle => {
                tx.set_enable(false);
                None
            }
        };

        if let Some(next) = next {
            self.goto(next);
        }
        Ok(())
    }

    #[inline]
    fn goto(&mut self, next: Phase) {
        log::trace!("orchestrator {:?} -> {:?}", self.phase, next);
        self.timer.reset();
        self.phase = next;
    }
}

fn not_acknowledged(policy: NackPolicy, transfer: &mut TransferState, tx: &mut ByteTransmitter) {
    let index = transfer.index();
    log::debug!("byte {} not acknowledged", index);

    match policy {
        NackPolicy::Retry(_) if transfer.retries_left > 0 => {
            // stop, then the whole message again behind a new start
            transfer.retries_left -= 1;
            transfer.remaining_bytes = transfer.message.len();
            transfer.issued = 0;
            tx.set_stop(true);
        }
        NackPolicy::Continue => {
            transfer.first_nack = transfer.first_nack.or(Some(index));
            transfer.remaining_bytes -= 1;
        }
        NackPolicy::Abort | NackPolicy::Retry(_) => {
            transfer.first_nack = transfer.first_nack.or(Some(index));
            transfer.remaining_bytes = 0;
            tx.set_stop(true);
        }
    }
}
