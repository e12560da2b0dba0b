//! Shared sampling/bit clock for the AFSK modem.
//!
//! One hardware timer serves both directions: it runs at the sample
//! rate (9600 Hz) while receiving and at the bit rate (1200 Hz) while
//! transmitting, never both at once. Every mode change stops the
//! timer, flips the mode under the mutex and restarts it at the new
//! rate - the only place the mode is mutated, so an in-flight tick
//! callback can never observe a half-switched clock.
//!
//! The tick callback consults [`AfskClock::mode`], a closed
//! two-variant selector, and dispatches to either the RX sampler or
//! the TX bit clock. The callback itself must stay bounded and
//! non-blocking; dispatching on the atomic snapshot satisfies that.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

/// Sample rate must be divisible by bit rate.
pub const BIT_RATE: u32 = 1200;
pub const SAMPLE_RATE: u32 = 9600;

/// What the periodic tick should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// Push one RX sample.
    Rx,
    /// Advance the TX bit clock.
    Tx,
}

/// Periodic timer seam (general-purpose hardware timer).
pub trait TickTimer {
    fn start(&mut self, rate_hz: u32);
    fn stop(&mut self);
}

struct ClockState<T> {
    timer: T,
    rx_mode: bool,
    tx_on: bool,
    running: bool,
}

/// The shared AFSK clock.
pub struct AfskClock<T> {
    state: Mutex<ClockState<T>>,
    // Snapshot for the tick callback: 0 = stopped, 1 = RX, 2 = TX.
    mode: AtomicU8,
}

const MODE_OFF: u8 = 0;
const MODE_RX: u8 = 1;
const MODE_TX: u8 = 2;

impl<T: TickTimer> AfskClock<T> {
    pub fn new(timer: T) -> Self {
        Self {
            state: Mutex::new(ClockState {
                timer,
                rx_mode: false,
                tx_on: false,
                running: false,
            }),
            mode: AtomicU8::new(MODE_OFF),
        }
    }

    /// Current tick dispatch target, `None` while the clock is stopped.
    pub fn mode(&self) -> Option<ClockMode> {
        match self.mode.load(Ordering::Acquire) {
            MODE_RX => Some(ClockMode::Rx),
            MODE_TX => Some(ClockMode::Tx),
            _ => None,
        }
    }

    fn publish(&self, st: &ClockState<T>) {
        let mode = if !st.running {
            MODE_OFF
        } else if st.rx_mode {
            MODE_RX
        } else {
            MODE_TX
        };
        self.mode.store(mode, Ordering::Release);
    }

    /// Switch the clock to RX sampling (called on squelch open).
    pub fn rx_start(&self) {
        let mut st = self.state.lock().unwrap();
        st.timer.stop();
        st.rx_mode = true;
        st.timer.start(SAMPLE_RATE);
        st.running = true;
        self.publish(&st);
    }

    /// Leave RX sampling; falls back to the bit clock if the
    /// transmitter side still wants it (called on squelch close).
    pub fn rx_stop(&self) {
        let mut st = self.state.lock().unwrap();
        st.timer.stop();
        st.running = false;
        st.rx_mode = false;
        if st.tx_on {
            st.timer.start(BIT_RATE);
            st.running = true;
        }
        self.publish(&st);
    }

    /// Run the bit clock for the transmitter.
    pub fn tx_start(&self) {
        let mut st = self.state.lock().unwrap();
        st.timer.stop();
        st.timer.start(BIT_RATE);
        st.running = true;
        st.tx_on = true;
        self.publish(&st);
    }

    /// Stop the bit clock; falls back to sampling if RX is active.
    pub fn tx_stop(&self) {
        let mut st = self.state.lock().unwrap();
        st.timer.stop();
        st.running = false;
        st.tx_on = false;
        if st.rx_mode {
            st.timer.start(SAMPLE_RATE);
            st.running = true;
        }
        self.publish(&st);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct MockTimer {
        rate: Arc<AtomicU32>,
        stops: Arc<AtomicU32>,
    }

    impl TickTimer for MockTimer {
        fn start(&mut self, rate_hz: u32) {
            self.rate.store(rate_hz, Ordering::Relaxed);
        }
        fn stop(&mut self) {
            self.rate.store(0, Ordering::Relaxed);
            self.stops.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn clock() -> (AfskClock<MockTimer>, MockTimer) {
        let timer = MockTimer::default();
        (AfskClock::new(timer.clone()), timer)
    }

    #[test]
    fn test_starts_stopped() {
        let (clk, timer) = clock();
        assert_eq!(clk.mode(), None);
        assert_eq!(timer.rate.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_rx_start_runs_at_sample_rate() {
        let (clk, timer) = clock();
        clk.rx_start();
        assert_eq!(clk.mode(), Some(ClockMode::Rx));
        assert_eq!(timer.rate.load(Ordering::Relaxed), SAMPLE_RATE);
    }

    #[test]
    fn test_tx_start_runs_at_bit_rate() {
        let (clk, timer) = clock();
        clk.tx_start();
        assert_eq!(clk.mode(), Some(ClockMode::Tx));
        assert_eq!(timer.rate.load(Ordering::Relaxed), BIT_RATE);
    }

    #[test]
    fn test_rx_stop_falls_back_to_tx() {
        let (clk, timer) = clock();
        clk.tx_start();
        clk.rx_start();
        assert_eq!(clk.mode(), Some(ClockMode::Rx));
        clk.rx_stop();
        // Transmitter still wants the clock: back to the bit rate.
        assert_eq!(clk.mode(), Some(ClockMode::Tx));
        assert_eq!(timer.rate.load(Ordering::Relaxed), BIT_RATE);
    }

    #[test]
    fn test_tx_stop_falls_back_to_rx() {
        let (clk, timer) = clock();
        clk.rx_start();
        clk.tx_stop();
        assert_eq!(clk.mode(), Some(ClockMode::Rx));
        assert_eq!(timer.rate.load(Ordering::Relaxed), SAMPLE_RATE);
    }

    #[test]
    fn test_both_stopped_is_off() {
        let (clk, timer) = clock();
        clk.tx_start();
        clk.tx_stop();
        assert_eq!(clk.mode(), None);
        assert_eq!(timer.rate.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_every_switch_stops_first() {
        let (clk, timer) = clock();
        clk.tx_start();
        clk.rx_start();
        clk.rx_stop();
        // Three switches, each bracketed by a stop.
        assert_eq!(timer.stops.load(Ordering::Relaxed), 3);
    }
}
