//! Software AFSK modem (1200 baud Bell 202).
//!
//! The modem is split along the ISR boundary: `ring`, `capture`,
//! `modulator` and `clock` hold the timing-critical state machines,
//! all host-testable, while `phy` ties them to the transceiver
//! module behind trait seams.

pub mod capture;
pub mod clock;
pub mod modulator;
#[cfg(feature = "phy-afsk")]
pub mod phy;
pub mod ring;
pub mod tone;

pub use capture::{CaptureConfig, CarrierDetect, FrameCapture, RawSample, SampleSource, SquelchSense};
pub use clock::{AfskClock, ClockMode, TickTimer};
pub use modulator::{Modulator, PttControl, TxQueue};
#[cfg(feature = "phy-afsk")]
pub use phy::{AfskPhy, AfskSettings, Transceiver};
pub use ring::{FrameReader, FrameWriter, RingAllocError, SampleRing};
pub use tone::{ToneControl, TonePhase, AFSK_MARK, AFSK_SPACE};
