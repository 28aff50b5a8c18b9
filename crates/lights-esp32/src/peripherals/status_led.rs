use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_svc::sys::EspError;
use lights_core::output::BinaryOutput;

/// Indicator LED on a plain GPIO
pub struct StatusLed<'d> {
    pin: PinDriver<'d, AnyOutputPin, Output>,
    inverted: bool,
}

impl<'d> StatusLed<'d> {
    /// Starts switched off
    pub fn new(pin: AnyOutputPin, inverted: bool) -> Result<Self, EspError> {
        let pin = PinDriver::output(pin)?;
        let mut led = Self { pin, inverted };
        led.turn_off();
        Ok(led)
    }
}

impl BinaryOutput for StatusLed<'_> {
    fn write_state(&mut self, state: bool) {
        let result = if state { self.pin.set_high() } else { self.pin.set_low() };
        if let Err(e) = result {
            log::warn!("Status LED write failed: {}", e);
        }
    }

    fn is_inverted(&self) -> bool {
        self.inverted
    }
}
