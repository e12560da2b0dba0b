//! AFSK transceiver front end.
//!
//! Owns the FM transceiver module, the shared modem clock and the
//! availability bookkeeping. Everything hardware-specific sits behind
//! the [`Transceiver`] trait; the module logic here runs unchanged on
//! the host.

use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};

use crate::afsk::clock::{AfskClock, TickTimer};
use crate::params::ParamStore;
use crate::radio::Availability;

/// Idle time before the last release powers the transceiver down.
pub const RELEASE_GRACE_MS: u64 = 60;

const KEY_TXFREQ: &str = "TXFREQ";
const KEY_RXFREQ: &str = "RXFREQ";
const KEY_SQUELCH: &str = "TRX_SQUELCH";

const DFL_TXFREQ: i32 = 1_448_000;
const DFL_RXFREQ: i32 = 1_448_000;
const DFL_SQUELCH: u8 = 1;

/// Group parameters pushed to the transceiver module in one command.
/// Frequencies are in 100 Hz units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AfskSettings {
    pub tx_freq: i32,
    pub rx_freq: i32,
    pub squelch: u8,
    pub low_power: bool,
}

impl AfskSettings {
    pub fn load(params: &dyn ParamStore) -> Self {
        Self {
            tx_freq: params.get_i32(KEY_TXFREQ, DFL_TXFREQ),
            rx_freq: params.get_i32(KEY_RXFREQ, DFL_RXFREQ),
            squelch: params.get_u8(KEY_SQUELCH, DFL_SQUELCH),
            low_power: false,
        }
    }
}

/// FM transceiver module (power pin, serial command set, PTT and
/// squelch pins).
pub trait Transceiver {
    type Error;

    fn set_power(&mut self, on: bool);
    /// Probe the serial link after power-up.
    fn handshake(&mut self) -> Result<(), Self::Error>;
    /// Push frequency, squelch and power level in one group command.
    fn apply_group(&mut self, settings: &AfskSettings) -> Result<(), Self::Error>;
    fn set_ptt(&mut self, on: bool);
    /// Level of the squelch input pin (true while a carrier is heard).
    fn squelch_open(&self) -> bool;
    fn rssi(&mut self) -> Result<i16, Self::Error>;
}

struct TrxState<T> {
    trx: T,
    settings: AfskSettings,
    sq_on: bool,
}

/// The AFSK radio front end.
pub struct AfskPhy<T, C> {
    state: Mutex<TrxState<T>>,
    avail: Availability,
    clock: Arc<AfskClock<C>>,
}

impl<T, C> AfskPhy<T, C>
where
    T: Transceiver,
    T::Error: Display,
    C: TickTimer,
{
    pub fn new(trx: T, clock: Arc<AfskClock<C>>, params: &dyn ParamStore) -> Self {
        Self {
            state: Mutex::new(TrxState {
                trx,
                settings: AfskSettings::load(params),
                sq_on: false,
            }),
            avail: Availability::new(),
            clock,
        }
    }

    pub fn availability(&self) -> &Availability {
        &self.avail
    }

    /// Turn the radio on if not already on. Blocks until it is ready.
    pub fn require(&self) -> u32 {
        let count = self.avail.require(|| {
            let mut st = self.state.lock().unwrap();
            st.trx.set_power(true);
            if let Err(e) = st.trx.handshake() {
                warn!("transceiver handshake failed: {e}");
            }
            let settings = st.settings.clone();
            if let Err(e) = st.trx.apply_group(&settings) {
                warn!("transceiver group setup failed: {e}");
            }
            self.avail.tx_off.set();
            if st.trx.squelch_open() {
                self.avail.channel_ready.clear();
            } else {
                self.avail.channel_ready.set();
            }
            self.clock.tx_start();
            self.avail.ready.set();
            info!("radio is turned ON");
        });
        count
    }

    /// Drop one user; the last release waits out any transmission and
    /// powers the module down.
    pub fn release(&self) -> u32 {
        self.avail
            .release(Duration::from_millis(RELEASE_GRACE_MS), || {
                self.clock.tx_stop();
                let mut st = self.state.lock().unwrap();
                st.trx.set_power(false);
                info!("radio is turned OFF");
            })
    }

    pub fn is_on(&self) -> bool {
        self.avail.is_on()
    }

    /// Squelch pin edge. Opening starts RX sampling and marks the
    /// channel busy; any edge while sampling stops it and frees the
    /// channel again. Edges while the radio is not ready are ignored.
    pub fn squelch_edge(&self) {
        let mut st = self.state.lock().unwrap();
        if !st.sq_on && self.avail.ready.is_set() && st.trx.squelch_open() {
            st.sq_on = true;
            self.clock.rx_start();
            self.avail.channel_ready.clear();
        } else if st.sq_on {
            st.sq_on = false;
            self.clock.rx_stop();
            self.avail.channel_ready.set();
        }
    }

    /// Key or release the transmitter. Keying marks the transmitter
    /// busy so a release blocks until the packet is out.
    pub fn ptt(&self, on: bool) {
        if !self.is_on() {
            return;
        }
        let mut st = self.state.lock().unwrap();
        st.trx.set_ptt(on);
        if on {
            self.avail.tx_off.clear();
        } else {
            self.avail.tx_off.set();
        }
    }

    /// Set TX/RX frequency in 100 Hz units. Zero keeps the current
    /// value.
    pub fn set_frequency(&self, tx_freq: i32, rx_freq: i32) -> Result<(), T::Error> {
        let mut st = self.state.lock().unwrap();
        if tx_freq > 0 {
            st.settings.tx_freq = tx_freq;
        }
        if rx_freq > 0 {
            st.settings.rx_freq = rx_freq;
        }
        let settings = st.settings.clone();
        st.trx.apply_group(&settings)
    }

    /// Set the squelch level, clamped to 0..=8.
    pub fn set_squelch(&self, level: u8) -> Result<(), T::Error> {
        let mut st = self.state.lock().unwrap();
        st.settings.squelch = level.min(8);
        let settings = st.settings.clone();
        st.trx.apply_group(&settings)
    }

    pub fn squelch_open(&self) -> bool {
        self.state.lock().unwrap().trx.squelch_open()
    }

    pub fn rssi(&self) -> Result<i16, T::Error> {
        self.state.lock().unwrap().trx.rssi()
    }

    /// Block until the radio is powered and configured.
    pub fn wait_enabled(&self) {
        self.avail.ready.wait();
    }

    /// Block until the channel is clear (radio on, squelch closed).
    pub fn wait_channel_ready(&self) {
        self.avail.channel_ready.wait();
    }
}

impl<T, C> crate::radio::RadioControl for AfskPhy<T, C>
where
    T: Transceiver,
    T::Error: Display,
    C: TickTimer,
{
    fn require(&self) -> u32 {
        AfskPhy::require(self)
    }

    fn release(&self) -> u32 {
        AfskPhy::release(self)
    }

    fn is_on(&self) -> bool {
        AfskPhy::is_on(self)
    }

    fn wait_enabled(&self) {
        AfskPhy::wait_enabled(self)
    }

    fn ptt(&self, on: bool) {
        AfskPhy::ptt(self, on)
    }

    fn set_frequency(&self, tx_freq: i32, rx_freq: i32) -> bool {
        match AfskPhy::set_frequency(self, tx_freq, rx_freq) {
            Ok(()) => true,
            Err(e) => {
                warn!("frequency change failed: {e}");
                false
            }
        }
    }

    fn set_squelch(&self, level: u8) -> bool {
        match AfskPhy::set_squelch(self, level) {
            Ok(()) => true,
            Err(e) => {
                warn!("squelch change failed: {e}");
                false
            }
        }
    }

    fn squelch_open(&self) -> bool {
        AfskPhy::squelch_open(self)
    }

    fn rssi(&self) -> i16 {
        AfskPhy::rssi(self).unwrap_or_else(|e| {
            warn!("RSSI read failed: {e}");
            0
        })
    }
}
