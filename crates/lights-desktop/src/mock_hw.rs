//! Simulated ADC, LEDC and delay for running the light on the host

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use lights_core::adc::{
    ADC_MAX_CODE, AdcBackend, AdcError, AdcHandle, AdcUnit, Attenuation, Calibration,
};
use lights_core::battery::AttributeSink;
use lights_core::config::LightConfig;
use lights_core::ledc::{ChannelConfig, LedcHal, PwmError, TimerConfig};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

// ESP-IDF error codes reported by the simulated drivers
const ESP_ERR_INVALID_STATE: i32 = 0x103;
const ESP_ERR_NOT_SUPPORTED: i32 = 0x106;

/// Channels per unit on the ESP32-C6
const CHANNEL_COUNT: usize = 7;

/// Largest code offset added to every conversion
const NOISE_CODES: i32 = 3;

/// Input voltage at full scale for each attenuation
pub fn full_scale_volts(attenuation: Attenuation) -> f32 {
    match attenuation {
        Attenuation::Db0 => 1.0,
        Attenuation::Db2_5 => 1.3,
        Attenuation::Db6 => 1.9,
        Attenuation::Db12 => 3.3,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything the simulated board exposes to the TUI
#[derive(Clone, Debug)]
pub struct SimState {
    /// Cell voltage, before the divider
    pub battery_volts: f32,
    pub divider: f32,
    /// ADC1 channel wired to the divider
    pub battery_channel: u8,
    /// Physical duty of the light output, 0.0 - 1.0
    pub light_duty: f32,
    pub light_bit_depth: u8,
    /// Last published battery-remaining attribute (half-percent units)
    pub battery_attribute: Option<u8>,
}

impl SimState {
    pub fn new(config: &LightConfig) -> Self {
        Self {
            battery_volts: 3.9,
            divider: config.battery.divider,
            battery_channel: config.battery_sensor.channel,
            light_duty: 0.0,
            light_bit_depth: 0,
            battery_attribute: None,
        }
    }

    fn pin_volts(&self, channel: u8) -> f32 {
        if channel == self.battery_channel {
            self.battery_volts / self.divider
        } else {
            0.0
        }
    }
}

pub type SharedSim = Arc<Mutex<SimState>>;

/// ADC backend with a single unit, like the ESP32-C6
pub struct SimAdcBackend {
    sim: SharedSim,
    seed: u64,
}

impl SimAdcBackend {
    pub fn new(sim: SharedSim, seed: u64) -> Self {
        Self { sim, seed }
    }
}

impl AdcBackend for SimAdcBackend {
    type Handle = SimAdcHandle;

    fn new_unit(&mut self, unit: AdcUnit) -> Result<SimAdcHandle, AdcError> {
        if unit != AdcUnit::Adc1 {
            return Err(AdcError::UnitInit(ESP_ERR_NOT_SUPPORTED));
        }

        Ok(SimAdcHandle {
            unit,
            inner: Arc::new(Mutex::new(SimUnit {
                sim: self.sim.clone(),
                rng: SmallRng::seed_from_u64(self.seed),
                attenuations: [None; CHANNEL_COUNT],
            })),
        })
    }
}

struct SimUnit {
    sim: SharedSim,
    rng: SmallRng,
    attenuations: [Option<Attenuation>; CHANNEL_COUNT],
}

#[derive(Clone)]
pub struct SimAdcHandle {
    unit: AdcUnit,
    inner: Arc<Mutex<SimUnit>>,
}

impl AdcHandle for SimAdcHandle {
    type Calibration = SimCalibration;

    fn unit(&self) -> AdcUnit {
        self.unit
    }

    fn configure_channel(&self, channel: u8, attenuation: Attenuation) -> Result<(), AdcError> {
        let mut unit = lock(&self.inner);
        let slot = unit
            .attenuations
            .get_mut(channel as usize)
            .ok_or(AdcError::ChannelConfig(ESP_ERR_NOT_SUPPORTED))?;
        *slot = Some(attenuation);
        Ok(())
    }

    fn read_raw(&self, channel: u8) -> Result<i32, AdcError> {
        let mut unit = lock(&self.inner);
        let attenuation = unit
            .attenuations
            .get(channel as usize)
            .copied()
            .flatten()
            .ok_or(AdcError::Read(ESP_ERR_INVALID_STATE))?;

        let volts = lock(&unit.sim).pin_volts(channel);
        let ideal = volts / full_scale_volts(attenuation) * ADC_MAX_CODE as f32;
        let noise = unit.rng.random_range(-NOISE_CODES..=NOISE_CODES);
        Ok((ideal as i32 + noise).clamp(0, ADC_MAX_CODE))
    }

    fn create_calibration(
        &self,
        _channel: u8,
        attenuation: Attenuation,
    ) -> Result<SimCalibration, AdcError> {
        Ok(SimCalibration {
            full_scale_mv: full_scale_volts(attenuation) * 1000.0,
        })
    }
}

/// Ideal linear calibration for one attenuation
pub struct SimCalibration {
    full_scale_mv: f32,
}

impl Calibration for SimCalibration {
    fn raw_to_millivolts(&self, raw: i32) -> Result<i32, AdcError> {
        Ok((raw as f32 * self.full_scale_mv / ADC_MAX_CODE as f32).round() as i32)
    }
}

/// LEDC peripheral that mirrors the light's duty into the shared state
pub struct SimLedc {
    sim: SharedSim,
    timer_bits: [u8; 4],
    channel_timer: [u8; 8],
}

impl SimLedc {
    pub fn new(sim: SharedSim) -> Self {
        Self {
            sim,
            timer_bits: [0; 4],
            channel_timer: [0; 8],
        }
    }

    fn max_duty(&self, channel: u8) -> u32 {
        let timer = self.channel_timer[channel as usize % 8];
        (1u32 << self.timer_bits[timer as usize % 4]) - 1
    }

    fn show(&self, channel: u8, ratio: f32) {
        let mut sim = lock(&self.sim);
        sim.light_duty = ratio.clamp(0.0, 1.0);
        let timer = self.channel_timer[channel as usize % 8];
        sim.light_bit_depth = self.timer_bits[timer as usize % 4];
    }
}

impl LedcHal for SimLedc {
    fn configure_timer(&mut self, config: &TimerConfig) -> Result<(), PwmError> {
        let slot = self
            .timer_bits
            .get_mut(config.timer as usize)
            .ok_or(PwmError::TimerCommit(ESP_ERR_NOT_SUPPORTED))?;
        *slot = config.bit_depth;
        Ok(())
    }

    fn configure_channel(&mut self, config: &ChannelConfig) -> Result<(), PwmError> {
        let slot = self
            .channel_timer
            .get_mut(config.channel as usize)
            .ok_or(PwmError::Channel(ESP_ERR_NOT_SUPPORTED))?;
        *slot = config.timer;
        let ratio = config.duty as f32 / self.max_duty(config.channel) as f32;
        self.show(config.channel, ratio);
        Ok(())
    }

    fn set_duty(&mut self, channel: u8, duty: u32, _hpoint: u32) -> Result<(), PwmError> {
        let ratio = duty as f32 / self.max_duty(channel) as f32;
        self.show(channel, ratio);
        Ok(())
    }

    fn stop(&mut self, channel: u8, idle_high: bool) -> Result<(), PwmError> {
        self.show(channel, if idle_high { 1.0 } else { 0.0 });
        Ok(())
    }
}

/// Publishes the battery attribute into the shared state
pub struct SimAttribute {
    sim: SharedSim,
}

impl SimAttribute {
    pub fn new(sim: SharedSim) -> Self {
        Self { sim }
    }
}

impl AttributeSink for SimAttribute {
    fn publish(&mut self, value: u8) {
        lock(&self.sim).battery_attribute = Some(value);
    }
}

/// Blocking delay on the calling thread
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms.into()));
    }
}

#[cfg(test)]
mod tests {
    use lights_core::adc::{AdcSensor, UnitRegistry};
    use lights_core::config::{OutputConfig, SensorConfig};
    use lights_core::ledc::LedcOutput;

    use super::*;

    fn sim() -> SharedSim {
        Arc::new(Mutex::new(SimState::new(&LightConfig::default())))
    }

    #[test]
    fn test_battery_pin_reads_through_divider() {
        let sim = sim();
        let mut units = UnitRegistry::new(SimAdcBackend::new(sim.clone(), 1));
        let mut sensor = AdcSensor::new(&SensorConfig::default());
        sensor.setup(&mut units).unwrap();

        let volts = sensor.read().unwrap();
        assert!((volts - 1.95).abs() < 0.01, "read {}", volts);
    }

    #[test]
    fn test_autorange_tracks_small_voltages() {
        let sim = sim();
        lock(&sim).battery_volts = 1.0;
        let mut units = UnitRegistry::new(SimAdcBackend::new(sim.clone(), 2));
        let mut sensor = AdcSensor::new(&SensorConfig {
            autorange: true,
            ..SensorConfig::default()
        });
        sensor.setup(&mut units).unwrap();

        let volts = sensor.read().unwrap();
        assert!((volts - 0.5).abs() < 0.01, "read {}", volts);
    }

    #[test]
    fn test_second_unit_is_unsupported() {
        let mut units = UnitRegistry::new(SimAdcBackend::new(sim(), 3));
        assert!(units.acquire(AdcUnit::Adc2).is_err());
        assert!(!units.is_initialized(AdcUnit::Adc2));
    }

    #[test]
    fn test_ledc_mirrors_output_state() {
        let sim = sim();
        let mut output = LedcOutput::new(SimLedc::new(sim.clone()), &OutputConfig::default());
        output.setup().unwrap();

        output.write_state(0.5).unwrap();
        assert!((lock(&sim).light_duty - 0.5).abs() < 1e-3);
        assert_eq!(lock(&sim).light_bit_depth, 12);

        output.write_state(1.0).unwrap();
        assert_eq!(lock(&sim).light_duty, 1.0);
    }
}
