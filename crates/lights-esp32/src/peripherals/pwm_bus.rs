//! PWM Bus - LEDC low-speed mode through the ESP-IDF driver
//!
//! The core `LedcOutput` decides bit depth, hpoint and the stop-vs-duty
//! routing; this module only turns its requests into driver calls.

use esp_idf_svc::sys::{self, esp, EspError};
use lights_core::ledc::{ChannelConfig, LedcHal, PwmError, TimerConfig};

const SPEED_MODE: sys::ledc_mode_t = sys::ledc_mode_t_LEDC_LOW_SPEED_MODE;

fn channel_error(e: EspError) -> PwmError {
    PwmError::Channel(e.code())
}

/// LEDC peripheral on the ESP32-C6
#[derive(Default)]
pub struct EspLedc;

impl EspLedc {
    pub fn new() -> Self {
        Self
    }
}

impl LedcHal for EspLedc {
    fn configure_timer(&mut self, config: &TimerConfig) -> Result<(), PwmError> {
        let timer = sys::ledc_timer_config_t {
            speed_mode: SPEED_MODE,
            duty_resolution: config.bit_depth as _,
            timer_num: config.timer as _,
            freq_hz: config.frequency_hz,
            // Zeroed clk_cfg selects LEDC_AUTO_CLK
            ..Default::default()
        };
        esp!(unsafe { sys::ledc_timer_config(&timer) }).map_err(|e| PwmError::TimerCommit(e.code()))
    }

    fn configure_channel(&mut self, config: &ChannelConfig) -> Result<(), PwmError> {
        let channel = sys::ledc_channel_config_t {
            gpio_num: config.gpio,
            speed_mode: SPEED_MODE,
            channel: config.channel as _,
            intr_type: sys::ledc_intr_type_t_LEDC_INTR_DISABLE,
            timer_sel: config.timer as _,
            duty: config.duty,
            hpoint: config.hpoint as _,
            ..Default::default()
        };
        esp!(unsafe { sys::ledc_channel_config(&channel) }).map_err(channel_error)
    }

    fn set_duty(&mut self, channel: u8, duty: u32, hpoint: u32) -> Result<(), PwmError> {
        esp!(unsafe { sys::ledc_set_duty_with_hpoint(SPEED_MODE, channel as _, duty, hpoint) })
            .map_err(channel_error)?;
        esp!(unsafe { sys::ledc_update_duty(SPEED_MODE, channel as _) }).map_err(channel_error)
    }

    fn stop(&mut self, channel: u8, idle_high: bool) -> Result<(), PwmError> {
        esp!(unsafe { sys::ledc_stop(SPEED_MODE, channel as _, u32::from(idle_high)) })
            .map_err(channel_error)
    }
}
