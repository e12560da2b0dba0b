//! Waitable boolean flag.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A boolean that threads can block on until it is set.
///
/// Setting wakes all waiters; clearing does not. Used for the
/// radio readiness flags (`ready`, `channel_ready`, `tx_off`).
pub struct Condition {
    flag: Mutex<bool>,
    cvar: Condvar,
}

impl Condition {
    pub fn new(initial: bool) -> Self {
        Self {
            flag: Mutex::new(initial),
            cvar: Condvar::new(),
        }
    }

    pub fn set(&self) {
        let mut flag = self.flag.lock().unwrap();
        *flag = true;
        self.cvar.notify_all();
    }

    pub fn clear(&self) {
        let mut flag = self.flag.lock().unwrap();
        *flag = false;
    }

    pub fn is_set(&self) -> bool {
        *self.flag.lock().unwrap()
    }

    /// Block until the flag is set.
    pub fn wait(&self) {
        let mut flag = self.flag.lock().unwrap();
        while !*flag {
            flag = self.cvar.wait(flag).unwrap();
        }
    }

    /// Block until the flag is set or the timeout elapses. Returns
    /// whether the flag was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut flag = self.flag.lock().unwrap();
        let deadline = std::time::Instant::now() + timeout;
        while !*flag {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, res) = self.cvar.wait_timeout(flag, deadline - now).unwrap();
            flag = guard;
            if res.timed_out() && !*flag {
                return false;
            }
        }
        true
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_set_and_clear() {
        let c = Condition::new(false);
        assert!(!c.is_set());
        c.set();
        assert!(c.is_set());
        c.clear();
        assert!(!c.is_set());
    }

    #[test]
    fn test_wait_already_set() {
        let c = Condition::new(true);
        c.wait();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let c = Condition::new(false);
        assert!(!c.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_wakes_on_set() {
        let c = Arc::new(Condition::new(false));
        let c2 = c.clone();
        let waiter = std::thread::spawn(move || c2.wait());
        std::thread::sleep(Duration::from_millis(20));
        c.set();
        waiter.join().unwrap();
    }
}
