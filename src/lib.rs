//! APRS radio link library for the ESP32 position tracker.
//!
//! This library contains platform-independent components that can be
//! tested on the host machine without ESP32 hardware: the AFSK modem
//! state machines, the AX.25 codec and the SX126x command protocol.
//! Hardware bindings live behind trait seams and the `esp32` feature.

pub mod afsk;
pub mod ax25;
pub mod lora;
pub mod params;
pub mod radio;

// Re-export commonly used items
pub use afsk::{FrameCapture, Modulator, SampleRing};
#[cfg(feature = "phy-afsk")]
pub use afsk::AfskPhy;
pub use ax25::{Addr, FrameBuf};
pub use lora::Sx126x;
#[cfg(feature = "phy-lora")]
pub use lora::LoraPhy;
pub use params::{MemoryParams, ParamStore};
pub use radio::{Availability, Condition, RadioControl};
