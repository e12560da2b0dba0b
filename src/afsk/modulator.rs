//! AFSK transmit modulator.
//!
//! A bit-clock state machine: while idle it watches the outgoing byte
//! queue; as soon as a byte appears it keys the transmitter (PTT +
//! tone on) and from then on emits one bit per clock tick. A zero bit
//! toggles the tone frequency, a one bit holds it (NRZI). When both
//! the queue and the shift register run dry the transmitter is
//! de-keyed again.
//!
//! [`Modulator::tick`] is the bit-clock callback: it runs in interrupt
//! context at the bit rate and never blocks. The shift register is
//! reloaded *after* the bit has been emitted, in the same tick, so the
//! queue pull never skews the bit timing.

use super::tone::ToneControl;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

/// Capacity of the outgoing byte queue.
pub const TX_QUEUE_SIZE: usize = 256;

/// Transmit-enable seam (the radio module's PTT line).
pub trait PttControl {
    fn set(&mut self, on: bool);
}

/// Sender half handed to the HDLC encoder.
#[derive(Clone)]
pub struct TxQueue {
    tx: SyncSender<u8>,
}

impl TxQueue {
    /// Queue one byte for transmission, blocking when full.
    pub fn put(&self, byte: u8) {
        // The modulator drains the queue as long as it exists; a send
        // can only fail once the modulator is gone.
        let _ = self.tx.send(byte);
    }

    /// Queue one byte without blocking. Returns false when full.
    pub fn try_put(&self, byte: u8) -> bool {
        !matches!(self.tx.try_send(byte), Err(TrySendError::Full(_)))
    }
}

/// The TX bit-clock state machine.
pub struct Modulator<T, P> {
    queue: Receiver<u8>,
    tone: T,
    ptt: P,
    bits: u8,
    bit_count: u8,
    transmit: bool,
}

impl<T: ToneControl, P: PttControl> Modulator<T, P> {
    /// Create the modulator and the queue feeding it.
    pub fn new(tone: T, ptt: P) -> (TxQueue, Self) {
        let (tx, rx) = sync_channel(TX_QUEUE_SIZE);
        let modulator = Self {
            queue: rx,
            tone,
            ptt,
            bits: 0,
            bit_count: 0,
            transmit: false,
        };
        (TxQueue { tx }, modulator)
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmit
    }

    /// Key or de-key transmitter and tone generator together.
    fn key(&mut self, on: bool) {
        self.transmit = on;
        self.ptt.set(on);
        if on {
            self.tone.start();
        } else {
            self.tone.stop();
        }
    }

    /// Shift out the next bit; 0 past the end of the register.
    fn get_bit(&mut self) -> u8 {
        if self.bit_count == 0 {
            return 0;
        }
        let bit = self.bits & 0x01;
        self.bits >>= 1;
        self.bit_count -= 1;
        bit
    }

    /// Refill the shift register from the queue if it ran dry; an
    /// empty queue at that point ends the transmission.
    fn next_byte(&mut self) {
        if self.bit_count == 0 {
            match self.queue.try_recv() {
                Ok(byte) => {
                    self.bits = byte;
                    self.bit_count = 8;
                }
                Err(_) => self.key(false),
            }
        }
    }

    /// Bit-clock tick, called periodically at the bit rate.
    pub fn tick(&mut self) {
        if !self.transmit {
            match self.queue.try_recv() {
                // Nothing to send: stay idle.
                Err(_) => return,
                Ok(byte) => {
                    self.bits = byte;
                    self.bit_count = 8;
                    self.key(true);
                }
            }
        }
        if self.get_bit() == 0 {
            self.tone.toggle();
        }
        // Reload after the emit, in the same tick, so the timing of
        // the emitted bit stays jitter-free.
        self.next_byte();
    }
}
