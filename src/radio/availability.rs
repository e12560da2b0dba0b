//! Reference-counted radio power management.
//!
//! On a battery-powered tracker the transceiver sits powered down
//! between beacons. Every task that needs the radio calls
//! [`Availability::require`] before touching it and
//! [`Availability::release`] when done; the hardware is brought up on
//! the first requirement and shut down when the last one is released.

use std::sync::Mutex;
use std::time::Duration;

use log::warn;

use crate::radio::condition::Condition;

/// Use counter plus the readiness flags a powered radio maintains.
pub struct Availability {
    use_count: Mutex<u32>,
    /// Radio is powered and configured.
    pub ready: Condition,
    /// Channel is clear to transmit on (squelch closed).
    pub channel_ready: Condition,
    /// The transmitter is not keyed.
    pub tx_off: Condition,
}

impl Availability {
    pub fn new() -> Self {
        Self {
            use_count: Mutex::new(0),
            ready: Condition::new(false),
            channel_ready: Condition::new(true),
            tx_off: Condition::new(true),
        }
    }

    /// Register a user. `bring_up` runs only on the 0 -> 1 edge, with
    /// the counter already at 1; callers then block on `ready`. A user
    /// arriving inside a release grace window finds the hardware still
    /// powered and skips the bring-up. Returns the new use count.
    pub fn require(&self, bring_up: impl FnOnce()) -> u32 {
        let count = {
            let mut count = self.use_count.lock().unwrap();
            *count += 1;
            *count
        };
        if count == 1 && !self.ready.is_set() {
            bring_up();
        }
        self.ready.wait();
        count
    }

    /// Drop a user. On the last release the call first waits for any
    /// transmission in flight to end, idles for `grace` so an
    /// immediately following requirement skips the power cycle, and
    /// shuts the hardware down via `power_down` if nobody showed up.
    /// Returns the new use count.
    pub fn release(&self, grace: Duration, power_down: impl FnOnce()) -> u32 {
        {
            let mut count = self.use_count.lock().unwrap();
            if *count == 0 {
                warn!("radio released more times than required");
                return 0;
            }
            *count -= 1;
            if *count > 0 {
                return *count;
            }
        }
        self.tx_off.wait();
        std::thread::sleep(grace);
        let mut count = self.use_count.lock().unwrap();
        if *count == 0 {
            self.ready.clear();
            power_down();
        }
        *count
    }

    pub fn count(&self) -> u32 {
        *self.use_count.lock().unwrap()
    }

    /// Whether the hardware should currently be powered.
    pub fn is_on(&self) -> bool {
        self.count() > 0
    }
}

impl Default for Availability {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn grace() -> Duration {
        Duration::from_millis(1)
    }

    #[test]
    fn test_power_follows_use_count() {
        let avail = Availability::new();
        let ups = AtomicU32::new(0);
        let downs = AtomicU32::new(0);

        let bring_up = || {
            ups.fetch_add(1, Ordering::Relaxed);
            avail.ready.set();
        };
        assert_eq!(avail.require(bring_up), 1);
        assert!(avail.is_on());
        // Second user piggybacks on the running radio.
        assert_eq!(avail.require(|| panic!("already up")), 2);
        assert_eq!(ups.load(Ordering::Relaxed), 1);

        assert_eq!(
            avail.release(grace(), || panic!("still in use")),
            1
        );
        assert!(avail.is_on());
        assert_eq!(
            avail.release(grace(), || {
                downs.fetch_add(1, Ordering::Relaxed);
            }),
            0
        );
        assert!(!avail.is_on());
        assert!(!avail.ready.is_set());
        assert_eq!(downs.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unbalanced_release_floors_at_zero() {
        let avail = Availability::new();
        assert_eq!(avail.release(grace(), || {}), 0);
        assert_eq!(avail.count(), 0);
        avail.require(|| avail.ready.set());
        avail.release(grace(), || {});
        assert_eq!(avail.release(grace(), || {}), 0);
        assert_eq!(avail.count(), 0);
    }

    #[test]
    fn test_release_waits_for_tx_off() {
        let avail = Arc::new(Availability::new());
        avail.require(|| avail.ready.set());
        avail.tx_off.clear();

        let a = avail.clone();
        let releaser = std::thread::spawn(move || {
            a.release(grace(), || {});
        });
        std::thread::sleep(Duration::from_millis(20));
        assert!(!releaser.is_finished());
        avail.tx_off.set();
        releaser.join().unwrap();
        assert!(!avail.is_on());
    }

    #[test]
    fn test_requirement_during_grace_keeps_power() {
        let avail = Arc::new(Availability::new());
        avail.require(|| avail.ready.set());

        let a = avail.clone();
        let releaser = std::thread::spawn(move || {
            a.release(Duration::from_millis(50), || panic!("reacquired"))
        });
        std::thread::sleep(Duration::from_millis(10));
        // New user arrives inside the grace window.
        avail.require(|| panic!("never went down"));
        assert_eq!(releaser.join().unwrap(), 1);
        assert!(avail.is_on());
    }
}
