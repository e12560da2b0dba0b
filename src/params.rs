//! Persistent operating parameters.
//!
//! Radio settings (frequency, squelch, LoRa modulation) survive deep
//! sleep in NVS on the device; the host build keeps them in memory.
//! Reads never fail: a missing or unreadable key yields its default
//! and a warning, so a corrupted store degrades to factory settings
//! instead of bricking the tracker.

use std::collections::HashMap;
use std::sync::Mutex;

/// Key/value store for operating parameters.
pub trait ParamStore: Send + Sync {
    fn get_u8(&self, key: &str, default: u8) -> u8;
    fn get_i32(&self, key: &str, default: i32) -> i32;
    fn set_u8(&self, key: &str, value: u8);
    fn set_i32(&self, key: &str, value: i32);
}

/// In-memory store for tests and the host build.
#[derive(Default)]
pub struct MemoryParams {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryParams {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParamStore for MemoryParams {
    fn get_u8(&self, key: &str, default: u8) -> u8 {
        self.values
            .lock()
            .unwrap()
            .get(key)
            .map(|v| *v as u8)
            .unwrap_or(default)
    }

    fn get_i32(&self, key: &str, default: i32) -> i32 {
        self.values
            .lock()
            .unwrap()
            .get(key)
            .map(|v| *v as i32)
            .unwrap_or(default)
    }

    fn set_u8(&self, key: &str, value: u8) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value as i64);
    }

    fn set_i32(&self, key: &str, value: i32) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value as i64);
    }
}

#[cfg(feature = "esp32")]
pub use esp32::NvsParams;

#[cfg(feature = "esp32")]
mod esp32 {
    use std::sync::Mutex;

    use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
    use log::warn;

    use super::ParamStore;

    const NAMESPACE: &str = "tracker";

    /// NVS-backed store on the default partition.
    pub struct NvsParams {
        nvs: Mutex<EspNvs<NvsDefault>>,
    }

    impl NvsParams {
        pub fn new() -> Result<Self, esp_idf_svc::sys::EspError> {
            let partition = EspNvsPartition::<NvsDefault>::take()?;
            let nvs = EspNvs::new(partition, NAMESPACE, true)?;
            Ok(Self {
                nvs: Mutex::new(nvs),
            })
        }
    }

    impl ParamStore for NvsParams {
        fn get_u8(&self, key: &str, default: u8) -> u8 {
            match self.nvs.lock().unwrap().get_u8(key) {
                Ok(Some(v)) => v,
                Ok(None) => default,
                Err(e) => {
                    warn!("param {key} read failed ({e}), using default");
                    default
                }
            }
        }

        fn get_i32(&self, key: &str, default: i32) -> i32 {
            match self.nvs.lock().unwrap().get_i32(key) {
                Ok(Some(v)) => v,
                Ok(None) => default,
                Err(e) => {
                    warn!("param {key} read failed ({e}), using default");
                    default
                }
            }
        }

        fn set_u8(&self, key: &str, value: u8) {
            if let Err(e) = self.nvs.lock().unwrap().set_u8(key, value) {
                warn!("param {key} write failed: {e}");
            }
        }

        fn set_i32(&self, key: &str, value: i32) {
            if let Err(e) = self.nvs.lock().unwrap().set_i32(key, value) {
                warn!("param {key} write failed: {e}");
            }
        }
    }
}
