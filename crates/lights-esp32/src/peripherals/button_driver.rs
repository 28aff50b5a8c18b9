//! BOOT button as an on/off trigger
//!
//! The pin is polled; each press toggles the light by posting a request to
//! the fade mailbox with the status LED lit while the request is pending.

use esp_idf_hal::gpio::{AnyInputPin, Input, PinDriver, Pull};
use esp_idf_svc::sys::EspError;
use lights_core::fade::FadeRequest;
use lights_core::mailbox::{FadeSender, MailboxClosed};
use lights_core::output::StatusIndicator;

use super::StatusLed;

/// Edge detection over polled samples
#[derive(Debug, Clone, Copy, Default)]
struct EdgeState {
    current: bool,
    previous: bool,
}

impl EdgeState {
    /// Returns true on a released -> pressed transition
    fn update(&mut self, pressed: bool) -> bool {
        self.previous = self.current;
        self.current = pressed;
        !self.previous && self.current
    }
}

/// Active-low push button driving the light's on/off state
pub struct ButtonDriver<'a> {
    pin: PinDriver<'a, AnyInputPin, Input>,
    edge: EdgeState,
    light_on: bool,
}

impl<'a> ButtonDriver<'a> {
    pub fn new(pin: AnyInputPin) -> Result<Self, EspError> {
        let mut pin = PinDriver::input(pin)?;
        pin.set_pull(Pull::Up)?;
        log::info!("ButtonDriver initialized");

        Ok(Self {
            pin,
            edge: EdgeState::default(),
            light_on: false,
        })
    }

    /// Sample the pin once, sending a toggle on a new press
    pub fn poll(
        &mut self,
        sender: &FadeSender,
        led: &mut StatusLed<'_>,
    ) -> Result<(), MailboxClosed> {
        if !self.edge.update(self.pin.is_low()) {
            return Ok(());
        }

        self.light_on = !self.light_on;
        log::info!("Button pressed, light {}", if self.light_on { "on" } else { "off" });
        sender.send_signalled(
            FadeRequest::OnOff(self.light_on),
            &mut StatusIndicator::new(led),
        )
    }
}
