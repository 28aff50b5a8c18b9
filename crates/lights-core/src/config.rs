//! Light configuration
//!
//! Defaults describe the stock fixture: a 10 kHz dimmed output and a battery
//! sensed through a 1:2 divider on ADC1 channel 0.

use crate::adc::{AdcUnit, Attenuation};
use crate::battery::BatteryCurve;

/// Analog sensor channel settings
#[derive(Debug, Clone)]
pub struct SensorConfig {
    pub unit: AdcUnit,
    pub channel: u8,
    pub attenuation: Attenuation,
    /// Conversions averaged per fixed-range reading
    pub sample_count: u8,
    /// Sample across all attenuations and fuse instead of using `attenuation`
    pub autorange: bool,
    /// Report the averaged raw code instead of volts
    pub output_raw: bool,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            unit: AdcUnit::Adc1,
            channel: 0,
            attenuation: Attenuation::Db12,
            sample_count: 10,
            autorange: false,
            output_raw: false,
        }
    }
}

/// Dimmed output settings
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub gpio: i32,
    /// LEDC channel; channels 2n and 2n+1 share timer n
    pub channel: u8,
    pub frequency_hz: f32,
    /// Start of the duty pulse within the period, in degrees
    pub phase_angle: f32,
    pub inverted: bool,
    /// Output power at level 0.0 (unless `zero_means_zero`)
    pub min_power: f32,
    /// Output power at level 1.0
    pub max_power: f32,
    /// Keep level 0.0 fully off even when `min_power` is above zero
    pub zero_means_zero: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            gpio: 17,
            channel: 0,
            frequency_hz: 10_000.0,
            phase_angle: 0.0,
            inverted: false,
            min_power: 0.0,
            max_power: 1.0,
            zero_means_zero: false,
        }
    }
}

/// Fade timing
#[derive(Debug, Clone)]
pub struct FadeConfig {
    /// Pause between two consecutive level steps
    pub step_delay_ms: u32,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self { step_delay_ms: 32 }
    }
}

/// Battery reporting
#[derive(Debug, Clone)]
pub struct BatteryConfig {
    /// Battery volts per volt seen at the ADC pin
    pub divider: f32,
    pub period_ms: u32,
    pub curve: BatteryCurve,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            divider: 2.0,
            period_ms: 60 * 1000,
            curve: BatteryCurve::default(),
        }
    }
}

/// Everything the fixture needs to run
#[derive(Debug, Clone, Default)]
pub struct LightConfig {
    pub battery_sensor: SensorConfig,
    pub output: OutputConfig,
    pub fade: FadeConfig,
    pub battery: BatteryConfig,
}
