//! LoRa radio front end.
//!
//! Wraps the SX126x driver with availability bookkeeping: the module
//! is powered through a supply switch and reconfigured from the
//! parameter store on every 0 -> 1 requirement edge.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, info, warn};

use crate::lora::driver::{Sx126x, LORA_BW_125, POWER_TABLE};
use crate::lora::port::CommandPort;
use crate::lora::settings::LoraSettings;
use crate::params::ParamStore;
use crate::radio::Availability;

/// Idle time before the last release cuts the supply.
pub const RELEASE_GRACE_MS: u64 = 60;

/// Upper bound on waiting for TX done at release. The chip aborts a
/// transmission after its own 500 ms TX timeout, so a lost interrupt
/// is the only way to still be "transmitting" past this.
pub const TX_DONE_TIMEOUT_MS: u64 = 600;

const POWER_UP_DELAY_MS: u32 = 10;
const PREAMBLE_LEN: u16 = 8;

pub struct LoraPhy<P> {
    driver: Mutex<Sx126x<P>>,
    avail: Availability,
    params: Arc<dyn ParamStore>,
}

impl<P: CommandPort> LoraPhy<P> {
    pub fn new(driver: Sx126x<P>, params: Arc<dyn ParamStore>) -> Self {
        Self {
            driver: Mutex::new(driver),
            avail: Availability::new(),
            params,
        }
    }

    pub fn availability(&self) -> &Availability {
        &self.avail
    }

    /// Turn the radio on if not already on.
    pub fn require(&self) -> u32 {
        self.avail.require(|| {
            let mut drv = self.driver.lock().unwrap();
            drv.port_mut().set_power(true);
            drv.port_mut().delay_ms(POWER_UP_DELAY_MS);

            let s = LoraSettings::load(self.params.as_ref());
            let cr = s.coding_rate.saturating_sub(4);
            info!(
                "LoRa on: freq={} sf={} cr={}",
                s.frequency_hz, s.spreading_factor, cr
            );
            let level = (s.tx_power as usize).min(POWER_TABLE.len() - 1);
            if let Err(e) = drv.begin(s.frequency_hz, POWER_TABLE[level], false) {
                error!("LoRa bring-up failed: {e}");
            }
            drv.configure(
                s.spreading_factor,
                LORA_BW_125,
                cr,
                PREAMBLE_LEN,
                0,
                true,
                false,
                s.ldro(),
            );
            self.avail.tx_off.set();
            self.avail.ready.set();
            info!("radio is turned ON");
        })
    }

    /// Drop one user, cutting the supply on the last release. A
    /// transmission whose TX done interrupt got lost is forced off
    /// after [`TX_DONE_TIMEOUT_MS`] instead of blocking the release.
    pub fn release(&self) -> u32 {
        if self.avail.count() == 1
            && !self
                .avail
                .tx_off
                .wait_timeout(Duration::from_millis(TX_DONE_TIMEOUT_MS))
        {
            warn!("TX done interrupt lost, forcing transmitter off");
            self.on_tx_done();
        }
        self.avail
            .release(Duration::from_millis(RELEASE_GRACE_MS), || {
                let mut drv = self.driver.lock().unwrap();
                drv.port_mut().set_power(false);
                info!("radio is turned OFF");
            })
    }

    pub fn is_on(&self) -> bool {
        self.avail.is_on()
    }

    /// Queue a packet and key the transmitter. The transmitter stays
    /// busy until [`on_tx_done`](Self::on_tx_done).
    pub fn send_packet(&self, data: &[u8]) {
        self.avail.tx_off.clear();
        self.driver.lock().unwrap().send(data);
    }

    /// TX done interrupt: back to continuous receive, transmitter
    /// marked idle.
    pub fn on_tx_done(&self) {
        let mut drv = self.driver.lock().unwrap();
        drv.tx_off();
        self.avail.tx_off.set();
    }

    /// Pull a received packet if one is pending.
    pub fn receive_packet(&self, buf: &mut [u8]) -> usize {
        self.driver.lock().unwrap().receive(buf)
    }

    pub fn clear_irq(&self) {
        self.driver.lock().unwrap().clear_irq();
    }

    pub fn rssi(&self) -> i16 {
        self.driver.lock().unwrap().rssi_dbm()
    }

    /// RSSI and SNR of the last received packet.
    pub fn packet_status(&self) -> (i8, i8) {
        self.driver.lock().unwrap().get_packet_status()
    }

    pub fn set_tx_power(&self, level: u8) {
        self.driver.lock().unwrap().set_tx_power(level);
    }
}

impl<P: CommandPort> crate::radio::RadioControl for LoraPhy<P> {
    fn require(&self) -> u32 {
        LoraPhy::require(self)
    }

    fn release(&self) -> u32 {
        LoraPhy::release(self)
    }

    fn is_on(&self) -> bool {
        LoraPhy::is_on(self)
    }

    fn wait_enabled(&self) {
        self.avail.ready.wait();
    }

    fn rssi(&self) -> i16 {
        LoraPhy::rssi(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lora::driver::tests::{MockPort, STATUS_OK};
    use crate::lora::driver::opcode;
    use crate::params::MemoryParams;

    fn phy_with(port: MockPort) -> LoraPhy<MockPort> {
        LoraPhy::new(Sx126x::new(port), Arc::new(MemoryParams::new()))
    }

    fn detected_port() -> MockPort {
        let mut port = MockPort::new();
        // Sync word probe answers the public sync word.
        port.replies
            .extend([STATUS_OK, STATUS_OK, STATUS_OK, STATUS_OK, 0x34, 0x44]);
        port
    }

    fn with_driver<T>(phy: &LoraPhy<MockPort>, f: impl FnOnce(&mut MockPort) -> T) -> T {
        f(phy.driver.lock().unwrap().port_mut())
    }

    #[test]
    fn test_require_powers_and_configures() {
        let phy = phy_with(detected_port());
        assert_eq!(phy.require(), 1);
        assert!(phy.is_on());
        assert!(phy.availability().tx_off.is_set());
        with_driver(&phy, |p| {
            assert!(p.powered);
            assert!(!p.sent(opcode::SET_MODULATION_PARAMS).is_empty());
            assert!(!p.sent(opcode::SET_RX).is_empty());
        });
        // Second user does not reconfigure.
        let rx_cmds = with_driver(&phy, |p| p.sent(opcode::SET_RX).len());
        phy.require();
        assert_eq!(with_driver(&phy, |p| p.sent(opcode::SET_RX).len()), rx_cmds);
    }

    #[test]
    fn test_last_release_cuts_power() {
        let phy = phy_with(detected_port());
        phy.require();
        phy.require();
        assert_eq!(phy.release(), 1);
        with_driver(&phy, |p| assert!(p.powered));
        assert_eq!(phy.release(), 0);
        with_driver(&phy, |p| assert!(!p.powered));
        assert!(!phy.is_on());
    }

    #[test]
    fn test_release_recovers_from_lost_tx_done() {
        let phy = phy_with(detected_port());
        phy.require();
        phy.send_packet(&[1, 2, 3]);
        assert!(!phy.availability().tx_off.is_set());
        // TX done interrupt never fires: release must still complete
        // once the bounded wait runs out.
        assert_eq!(phy.release(), 0);
        assert!(phy.availability().tx_off.is_set());
        with_driver(&phy, |p| {
            assert!(!p.pa_enabled);
            assert!(!p.powered);
        });
    }

    #[test]
    fn test_unbalanced_release_floors() {
        let phy = phy_with(MockPort::new());
        assert_eq!(phy.release(), 0);
        assert_eq!(phy.release(), 0);
    }

    #[test]
    fn test_send_and_tx_done_cycle() {
        let phy = phy_with(detected_port());
        phy.require();
        phy.send_packet(&[1, 2, 3]);
        assert!(!phy.availability().tx_off.is_set());
        with_driver(&phy, |p| assert!(p.pa_enabled));

        phy.on_tx_done();
        assert!(phy.availability().tx_off.is_set());
        with_driver(&phy, |p| assert!(!p.pa_enabled));
    }
}
