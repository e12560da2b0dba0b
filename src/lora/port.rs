//! Hardware seam for the SX126x command protocol.

/// Raw access to the SX126x module: SPI byte transfers with manual
/// chip select, the BUSY pin, reset, the PA enable line and the
/// supply switch. The driver owns all protocol logic on top of this.
pub trait CommandPort {
    fn select(&mut self, selected: bool);
    /// Exchange one byte on SPI.
    fn transfer(&mut self, byte: u8) -> u8;
    /// Level of the BUSY pin.
    fn busy(&self) -> bool;
    fn set_reset(&mut self, level: bool);
    /// PA enable line (DIO3 on this module).
    fn set_pa_enable(&mut self, on: bool);
    /// Supply switch for the whole radio module.
    fn set_power(&mut self, on: bool);
    fn delay_ms(&mut self, ms: u32);
}

#[cfg(feature = "esp32")]
pub use esp32::EspCommandPort;

#[cfg(feature = "esp32")]
mod esp32 {
    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, Input, Output, PinDriver};
    use esp_idf_hal::peripheral::Peripheral;
    use esp_idf_hal::spi::config::Config as SpiConfig;
    use esp_idf_hal::spi::config::DriverConfig;
    use esp_idf_hal::spi::{SpiAnyPins, SpiDeviceDriver, SpiDriver};
    use esp_idf_hal::units::FromValueType;
    use esp_idf_sys::EspError;

    use super::CommandPort;

    /// SX126x port on the ESP32 SPI bus. Chip select is driven
    /// manually so a command can be bracketed around several
    /// transfers.
    pub struct EspCommandPort<'d> {
        spi: SpiDeviceDriver<'d, SpiDriver<'d>>,
        cs: PinDriver<'d, AnyOutputPin, Output>,
        busy: PinDriver<'d, AnyInputPin, Input>,
        reset: PinDriver<'d, AnyOutputPin, Output>,
        pa_enable: PinDriver<'d, AnyOutputPin, Output>,
        power: PinDriver<'d, AnyOutputPin, Output>,
    }

    impl<'d> EspCommandPort<'d> {
        #[allow(clippy::too_many_arguments)]
        pub fn new(
            spi: impl Peripheral<P = impl SpiAnyPins> + 'd,
            sclk: AnyIOPin,
            mosi: AnyIOPin,
            miso: AnyIOPin,
            cs: AnyOutputPin,
            busy: AnyInputPin,
            reset: AnyOutputPin,
            pa_enable: AnyOutputPin,
            power: AnyOutputPin,
        ) -> Result<Self, EspError> {
            let spi_config = SpiConfig::new().baudrate(2.MHz().into());
            let driver_config = DriverConfig::new();
            let spi_driver = SpiDriver::new(spi, sclk, mosi, Some(miso), &driver_config)?;
            let spi = SpiDeviceDriver::new(spi_driver, None::<AnyIOPin>, &spi_config)?;

            let mut cs = PinDriver::output(cs)?;
            cs.set_high()?;
            let busy = PinDriver::input(busy)?;
            let mut reset = PinDriver::output(reset)?;
            reset.set_high()?;
            let mut pa_enable = PinDriver::output(pa_enable)?;
            pa_enable.set_low()?;
            let mut power = PinDriver::output(power)?;
            power.set_low()?;

            Ok(Self {
                spi,
                cs,
                busy,
                reset,
                pa_enable,
                power,
            })
        }
    }

    impl CommandPort for EspCommandPort<'_> {
        fn select(&mut self, selected: bool) {
            let _ = if selected {
                self.cs.set_low()
            } else {
                self.cs.set_high()
            };
        }

        fn transfer(&mut self, byte: u8) -> u8 {
            let mut rx = [0u8];
            if self.spi.transfer(&mut rx, &[byte]).is_err() {
                return 0;
            }
            rx[0]
        }

        fn busy(&self) -> bool {
            self.busy.is_high()
        }

        fn set_reset(&mut self, level: bool) {
            let _ = if level {
                self.reset.set_high()
            } else {
                self.reset.set_low()
            };
        }

        fn set_pa_enable(&mut self, on: bool) {
            let _ = if on {
                self.pa_enable.set_high()
            } else {
                self.pa_enable.set_low()
            };
        }

        fn set_power(&mut self, on: bool) {
            let _ = if on {
                self.power.set_high()
            } else {
                self.power.set_low()
            };
        }

        fn delay_ms(&mut self, ms: u32) {
            FreeRtos::delay_ms(ms);
        }
    }
}
