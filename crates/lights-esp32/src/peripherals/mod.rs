pub mod adc_bus;
mod button_driver;
mod power_control;
pub mod pwm_bus;
mod status_led;

pub use adc_bus::EspAdcBackend;
pub use button_driver::ButtonDriver;
pub use power_control::{BatteryAttribute, PowerConfig, PowerControl};
pub use pwm_bus::EspLedc;
pub use status_led::StatusLed;

use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::sys::EspError;

/// Board wiring for the ESP32-C6 light controller
pub struct SystemPeripherals {
    pub button: AnyInputPin,     // GPIO9 (BOOT button)
    pub status_led: AnyOutputPin, // GPIO15
    pub light: LightPeripherals,
    pub battery: BatteryPeripherals,
}

/// Dimmed output, driven by LEDC channel 0 / timer 0
#[allow(dead_code)] // held, never read
pub struct LightPeripherals {
    pub pin: esp_idf_hal::gpio::Gpio17,
    pub channel: esp_idf_hal::ledc::CHANNEL0,
    pub timer: esp_idf_hal::ledc::TIMER0,
}

/// Battery voltage through a 1:2 divider on ADC1 channel 0
#[allow(dead_code)] // held, never read
pub struct BatteryPeripherals {
    pub adc1: esp_idf_hal::adc::ADC1,
    pub pin: esp_idf_hal::gpio::Gpio0,
}

impl SystemPeripherals {
    pub fn take() -> Result<Self, EspError> {
        let peripherals = Peripherals::take()?;

        Ok(SystemPeripherals {
            button: peripherals.pins.gpio9.into(),
            status_led: peripherals.pins.gpio15.into(),
            light: LightPeripherals {
                pin: peripherals.pins.gpio17,
                channel: peripherals.ledc.channel0,
                timer: peripherals.ledc.timer0,
            },
            battery: BatteryPeripherals {
                adc1: peripherals.adc1,
                pin: peripherals.pins.gpio0,
            },
        })
    }
}
