//! Radio power management and the common control surface.

pub mod availability;
pub mod condition;

pub use availability::Availability;
pub use condition::Condition;

/// Control surface shared by the AFSK transceiver and the LoRa
/// front end. Tasks hold the radio through `require`/`release` and
/// poke channel state in between. Controls a backend has no hardware
/// for fall through to no-op defaults, as with PTT on the LoRa chip.
pub trait RadioControl {
    /// Power the radio up (or join its current users). Returns the
    /// use count.
    fn require(&self) -> u32;
    /// Drop this user, powering down on the last release.
    fn release(&self) -> u32;
    /// Whether anyone is holding the radio on.
    fn is_on(&self) -> bool;
    /// Block until the radio is powered and configured.
    fn wait_enabled(&self) {}
    /// Key or release the transmitter.
    fn ptt(&self, _on: bool) {}
    /// TX/RX frequency in 100 Hz units, zero keeps the current value.
    /// Returns whether the backend accepted the change.
    fn set_frequency(&self, _tx_freq: i32, _rx_freq: i32) -> bool {
        false
    }
    fn set_squelch(&self, _level: u8) -> bool {
        false
    }
    fn squelch_open(&self) -> bool {
        false
    }
    /// Current signal level in dBm, 0 when unavailable.
    fn rssi(&self) -> i16;
}
