//! Power Control - light sleep policy and battery attribute
//!
//! This module handles:
//! - Enabling automatic light sleep through the ESP-IDF power manager
//! - Holding a `NO_LIGHT_SLEEP` lock for every live wakelock
//! - Exposing the battery-remaining attribute published by the monitor

use std::ffi::CStr;
use std::ptr;

use esp_idf_svc::sys::{self, esp, EspError};
use lights_core::battery::AttributeSink;
use lights_core::wakelock::PowerLock;

const PM_LOCK_NAME: &CStr = c"lights_fade";

/// Power manager settings
#[derive(Clone)]
pub struct PowerConfig {
    pub max_freq_mhz: i32,
    pub min_freq_mhz: i32,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            max_freq_mhz: 160,
            min_freq_mhz: 40,
        }
    }
}

/// Power controller
///
/// Owns the power manager's `NO_LIGHT_SLEEP` lock. The lock counts nested
/// acquisitions, so it is taken once per wakelock and the chip can only
/// sleep once every wakelock is gone.
pub struct PowerControl {
    pm_lock: sys::esp_pm_lock_handle_t,
}

// The power manager serializes access to its locks internally.
unsafe impl Send for PowerControl {}
unsafe impl Sync for PowerControl {}

impl PowerControl {
    /// Configure automatic light sleep and create the inhibiting lock
    ///
    /// Fails without `CONFIG_PM_ENABLE`.
    pub fn new(config: &PowerConfig) -> Result<Self, EspError> {
        let pm_config = sys::esp_pm_config_t {
            max_freq_mhz: config.max_freq_mhz,
            min_freq_mhz: config.min_freq_mhz,
            light_sleep_enable: true,
        };
        esp!(unsafe { sys::esp_pm_configure(&pm_config as *const _ as *const _) })?;

        let mut pm_lock: sys::esp_pm_lock_handle_t = ptr::null_mut();
        esp!(unsafe {
            sys::esp_pm_lock_create(
                sys::esp_pm_lock_type_t_ESP_PM_NO_LIGHT_SLEEP,
                0,
                PM_LOCK_NAME.as_ptr(),
                &mut pm_lock,
            )
        })?;

        log::info!(
            "Light sleep enabled ({}..{} MHz)",
            config.min_freq_mhz,
            config.max_freq_mhz
        );
        Ok(Self { pm_lock })
    }
}

impl PowerLock for PowerControl {
    fn acquire(&self) {
        if let Err(e) = esp!(unsafe { sys::esp_pm_lock_acquire(self.pm_lock) }) {
            log::error!("Failed to take light sleep lock: {}", e);
        }
    }

    fn release(&self) {
        if let Err(e) = esp!(unsafe { sys::esp_pm_lock_release(self.pm_lock) }) {
            log::error!("Failed to give back light sleep lock: {}", e);
        }
    }
}

impl Drop for PowerControl {
    fn drop(&mut self) {
        if let Err(e) = esp!(unsafe { sys::esp_pm_lock_delete(self.pm_lock) }) {
            log::warn!("Failed to delete light sleep lock: {}", e);
        }
    }
}

/// Battery-remaining attribute, in half-percent units
#[derive(Default)]
pub struct BatteryAttribute {
    last: Option<u8>,
}

impl AttributeSink for BatteryAttribute {
    fn publish(&mut self, value: u8) {
        if self.last == Some(value) {
            log::debug!("Battery remaining attribute unchanged: {}", value);
            return;
        }
        self.last = Some(value);
        log::info!("Battery remaining attribute: {}", value);
    }
}
