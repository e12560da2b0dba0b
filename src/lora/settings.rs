//! Persisted LoRa operating parameters.

use crate::params::ParamStore;

const KEY_FREQ: &str = "FREQ";
const KEY_SF: &str = "LORA_SF";
const KEY_CR: &str = "LORA_CR";
const KEY_TXPOWER: &str = "TXPOWER";

const DFL_FREQ: i32 = 433_775_000;
const DFL_SF: u8 = 12;
const DFL_CR: u8 = 5;
const DFL_TXPOWER: u8 = 3;

/// Modulation settings read from the parameter store at power-up.
/// Coding rate is denominator form (5 means 4/5), TX power is a
/// level into the module's power table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoraSettings {
    pub frequency_hz: u32,
    pub spreading_factor: u8,
    pub coding_rate: u8,
    pub tx_power: u8,
}

impl LoraSettings {
    pub fn load(params: &dyn ParamStore) -> Self {
        Self {
            frequency_hz: params.get_i32(KEY_FREQ, DFL_FREQ) as u32,
            spreading_factor: params.get_u8(KEY_SF, DFL_SF),
            coding_rate: params.get_u8(KEY_CR, DFL_CR),
            tx_power: params.get_u8(KEY_TXPOWER, DFL_TXPOWER),
        }
    }

    /// Low data rate optimization is required at the slow spreading
    /// factors.
    pub fn ldro(&self) -> u8 {
        if self.spreading_factor >= 11 {
            1
        } else {
            0
        }
    }
}
