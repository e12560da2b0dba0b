//! SX126x LoRa radio: command protocol driver and front end.

pub mod driver;
#[cfg(feature = "phy-lora")]
pub mod phy;
pub mod port;
pub mod retry;
pub mod settings;

pub use driver::{irq, opcode, status, DriverError, Sx126x, POWER_TABLE};
#[cfg(feature = "phy-lora")]
pub use phy::LoraPhy;
pub use port::CommandPort;
pub use retry::{retry_with_timeout, Retry};
pub use settings::LoraSettings;

#[cfg(feature = "esp32")]
pub use port::EspCommandPort;
