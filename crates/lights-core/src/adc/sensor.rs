//! Sensor channel and sampling engine
//!
//! A sensor reads one channel either at its configured attenuation
//! (averaged over `sample_count` conversions) or by autoranging across all
//! four attenuations and fusing the results by how close each range placed
//! the signal to mid-scale.

use core::array;

use super::{
    ADC_MAX_CODE, AdcBackend, AdcError, AdcHandle, AdcUnit, Attenuation, Calibration,
    FULL_SCALE_VOLTS, UnitRegistry, VoltageSource,
};
#[cfg(feature = "std")]
use super::SharedRegistry;
use crate::config::SensorConfig;

/// Half of the maximum code; peak of the autorange trust triangle
const HALF_SCALE: f32 = ADC_MAX_CODE as f32 / 2.0;

/// Fixed linear conversion used when no calibration scheme is available
pub fn linear_volts(raw: i32) -> f32 {
    raw as f32 * FULL_SCALE_VOLTS / ADC_MAX_CODE as f32
}

/// Where a range sits in the autorange chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePosition {
    /// Widest range (12 dB), trusted up to half-scale and beyond
    Coarsest,
    /// Middle ranges, trusted most at mid-scale
    Inner,
    /// Narrowest range (0 dB), trusted from zero up to half-scale
    Finest,
}

impl RangePosition {
    fn of(index: usize) -> Self {
        match index {
            0 => RangePosition::Coarsest,
            i if i + 1 == Attenuation::AUTORANGE_ORDER.len() => RangePosition::Finest,
            _ => RangePosition::Inner,
        }
    }
}

/// Trust weight of a raw code for a range at `position`
///
/// Coarsest: `min(raw, H)`. Inner: `H - |raw - H|`. Finest:
/// `min(max - raw, H)`. Never negative.
pub fn autorange_weight(position: RangePosition, raw: i32) -> f32 {
    let raw = raw.clamp(0, ADC_MAX_CODE) as f32;
    let weight = match position {
        RangePosition::Coarsest => raw.min(HALF_SCALE),
        RangePosition::Inner if raw > HALF_SCALE => ADC_MAX_CODE as f32 - raw,
        RangePosition::Inner => raw,
        RangePosition::Finest => (ADC_MAX_CODE as f32 - raw).min(HALF_SCALE),
    };
    weight.max(0.0)
}

/// One range's contribution to an autorange reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeReading {
    pub raw: i32,
    pub volts: f32,
}

/// Weight-normalized average of the probed ranges
///
/// `ranges` is in [`Attenuation::AUTORANGE_ORDER`]; `None` marks a range
/// that was skipped because a narrower one already saturated.
pub fn fuse_ranges(ranges: &[Option<RangeReading>; 4]) -> Result<f32, AdcError> {
    let mut weighted = 0.0f32;
    let mut total = 0.0f32;

    for (index, reading) in ranges.iter().enumerate() {
        let Some(reading) = reading else { continue };
        let weight = autorange_weight(RangePosition::of(index), reading.raw);
        weighted += reading.volts * weight;
        total += weight;
    }

    if total <= 0.0 {
        return Err(AdcError::ZeroWeight);
    }
    Ok(weighted / total)
}

/// Lazily created calibration for one autorange level
enum RangeCalibration<C> {
    Untried,
    Ready(C),
    Unavailable,
}

/// A logical analog input on one channel of one unit
pub struct AdcSensor<H: AdcHandle> {
    unit: AdcUnit,
    channel: u8,
    attenuation: Attenuation,
    sample_count: u8,
    autorange: bool,
    output_raw: bool,

    handle: Option<H>,
    /// Scheme for `attenuation`, used by fixed-range sampling
    calibration: Option<H::Calibration>,
    /// Schemes per attenuation, used by autoranging
    range_calibrations: [RangeCalibration<H::Calibration>; 4],
    /// Attenuation currently programmed into the channel
    applied_attenuation: Option<Attenuation>,
    needs_setup: bool,
    /// Last scheme creation failed; the next setup tries again
    calibration_pending: bool,
}

impl<H: AdcHandle> AdcSensor<H> {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            unit: config.unit,
            channel: config.channel,
            attenuation: config.attenuation,
            sample_count: config.sample_count.max(1),
            autorange: config.autorange,
            output_raw: config.output_raw,
            handle: None,
            calibration: None,
            range_calibrations: array::from_fn(|_| RangeCalibration::Untried),
            applied_attenuation: None,
            needs_setup: true,
            calibration_pending: false,
        }
    }

    pub fn set_attenuation(&mut self, attenuation: Attenuation) {
        if attenuation != self.attenuation {
            self.attenuation = attenuation;
            self.calibration = None;
        }
        self.needs_setup = true;
    }

    pub fn set_channel(&mut self, unit: AdcUnit, channel: u8) {
        if unit != self.unit {
            self.handle = None;
        }
        self.unit = unit;
        self.channel = channel;
        self.calibration = None;
        self.range_calibrations = array::from_fn(|_| RangeCalibration::Untried);
        self.applied_attenuation = None;
        self.needs_setup = true;
    }

    /// Zero is ignored; at least one conversion is always taken
    pub fn set_sample_count(&mut self, sample_count: u8) {
        if sample_count != 0 {
            self.sample_count = sample_count;
        }
    }

    pub fn set_autorange(&mut self, autorange: bool) {
        self.autorange = autorange;
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// True until setup has configured the channel and built its calibration
    pub fn needs_setup(&self) -> bool {
        self.needs_setup || self.calibration_pending
    }

    /// Acquire the unit, configure the channel and build its calibration
    ///
    /// Does nothing once the channel is configured and calibrated. A missing
    /// calibration is not an error: readings fall back to the linear
    /// conversion until a later setup manages to build the scheme.
    pub fn setup<B>(&mut self, units: &mut UnitRegistry<B>) -> Result<(), AdcError>
    where
        B: AdcBackend<Handle = H>,
    {
        if !self.needs_setup() {
            return Ok(());
        }
        log::info!("Setting up ADC {:?} channel {}", self.unit, self.channel);

        let handle = match self.handle.take() {
            Some(handle) if handle.unit() == self.unit => handle,
            _ => units.acquire(self.unit)?,
        };
        let result = self.configure(&handle);
        self.handle = Some(handle);
        result
    }

    /// [`setup`](Self::setup) through the process-wide registry
    #[cfg(feature = "std")]
    pub fn setup_shared<B>(&mut self, units: &SharedRegistry<B>) -> Result<(), AdcError>
    where
        B: AdcBackend<Handle = H>,
    {
        if !self.needs_setup() {
            return Ok(());
        }
        let mut units = units.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.setup(&mut units)
    }

    fn configure(&mut self, handle: &H) -> Result<(), AdcError> {
        handle
            .configure_channel(self.channel, self.attenuation)
            .inspect_err(|e| {
                log::error!("Error configuring {:?} channel {}: {}", self.unit, self.channel, e)
            })?;
        self.applied_attenuation = Some(self.attenuation);

        if self.calibration.is_none() {
            match handle.create_calibration(self.channel, self.attenuation) {
                Ok(calibration) => {
                    log::debug!("Using calibration for {:?}", self.attenuation);
                    self.calibration = Some(calibration);
                    self.calibration_pending = false;
                }
                Err(e) => {
                    log::warn!("Calibration failed: {}, will use uncalibrated readings", e);
                    self.calibration_pending = true;
                }
            }
        }

        self.needs_setup = false;
        Ok(())
    }

    /// Take one reading in volts (or averaged raw code with `output_raw`)
    pub fn read(&mut self) -> Result<f32, AdcError> {
        let handle = match &self.handle {
            Some(handle) if handle.unit() == self.unit => handle.clone(),
            _ => return Err(AdcError::NotConfigured),
        };
        if self.needs_setup {
            self.configure(&handle)?;
        }

        if self.autorange {
            self.read_autorange(&handle)
        } else {
            self.read_fixed(&handle)
        }
    }

    fn read_fixed(&mut self, handle: &H) -> Result<f32, AdcError> {
        if self.applied_attenuation != Some(self.attenuation) {
            handle.configure_channel(self.channel, self.attenuation)?;
            self.applied_attenuation = Some(self.attenuation);
        }

        let mut sum: u32 = 0;
        let mut successes: u32 = 0;
        for _ in 0..self.sample_count {
            match handle.read_raw(self.channel) {
                Ok(raw) if raw < 0 => log::warn!("Invalid ADC reading"),
                Ok(raw) => {
                    sum += raw as u32;
                    successes += 1;
                }
                Err(e) => log::warn!("ADC {}", e),
            }
        }

        if successes == 0 {
            log::error!("All ADC readings failed");
            return Err(AdcError::NoValidSamples);
        }

        let raw = ((sum + (successes >> 1)) / successes) as i32;
        if self.output_raw {
            return Ok(raw as f32);
        }
        Ok(self.convert(raw))
    }

    fn convert(&mut self, raw: i32) -> f32 {
        let calibrated = self.calibration.as_ref().map(|c| c.raw_to_millivolts(raw));
        match calibrated {
            Some(Ok(millivolts)) => return millivolts as f32 / 1000.0,
            Some(Err(e)) => {
                log::warn!("ADC {}, disabling calibration", e);
                self.calibration = None;
            }
            None => {}
        }
        linear_volts(raw)
    }

    fn read_autorange(&mut self, handle: &H) -> Result<f32, AdcError> {
        let mut ranges: [Option<RangeReading>; 4] = [None; 4];

        for (index, attenuation) in Attenuation::AUTORANGE_ORDER.into_iter().enumerate() {
            let reading = self
                .read_range(handle, attenuation)
                .inspect_err(|e| log::error!("Failed to read ADC in autorange mode: {}", e))?;
            ranges[index] = Some(reading);

            // A saturated range leaves nothing for the narrower ones to resolve.
            if reading.raw >= ADC_MAX_CODE {
                break;
            }
        }

        fuse_ranges(&ranges)
            .inspect_err(|_| log::error!("Invalid weight sum in autorange calculation"))
    }

    fn read_range(
        &mut self,
        handle: &H,
        attenuation: Attenuation,
    ) -> Result<RangeReading, AdcError> {
        handle.configure_channel(self.channel, attenuation)?;
        self.applied_attenuation = Some(attenuation);

        let raw = handle.read_raw(self.channel)?;
        if raw < 0 {
            return Err(AdcError::InvalidCode);
        }

        let index = attenuation.index();
        if let RangeCalibration::Untried = self.range_calibrations[index] {
            let created = handle.create_calibration(self.channel, attenuation);
            self.range_calibrations[index] = match created {
                Ok(calibration) => RangeCalibration::Ready(calibration),
                Err(e) => {
                    log::warn!(
                        "No calibration for {:?} ({}), using linear conversion",
                        attenuation,
                        e
                    );
                    RangeCalibration::Unavailable
                }
            };
        }

        let calibrated = match &self.range_calibrations[index] {
            RangeCalibration::Ready(calibration) => Some(calibration.raw_to_millivolts(raw)),
            _ => None,
        };
        let volts = match calibrated {
            Some(Ok(millivolts)) => millivolts as f32 / 1000.0,
            Some(Err(e)) => {
                log::warn!("ADC {} in autorange", e);
                self.range_calibrations[index] = RangeCalibration::Unavailable;
                linear_volts(raw)
            }
            None => linear_volts(raw),
        };

        Ok(RangeReading { raw, volts })
    }
}

impl<H: AdcHandle> VoltageSource for AdcSensor<H> {
    /// NaN when no reading could be taken; never a substitute zero
    fn sample(&mut self) -> f32 {
        self.read().unwrap_or_else(|e| {
            log::error!("ADC sample failed: {}", e);
            f32::NAN
        })
    }
}

#[cfg(test)]
mod tests {
    use alloc::collections::VecDeque;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use super::*;

    /// Scripted conversion results per attenuation plus a call log
    #[derive(Default)]
    struct Script {
        reads: [VecDeque<Result<i32, AdcError>>; 4],
        configured: Vec<Attenuation>,
        calibration_fails: bool,
        conversion_fails: bool,
        current: Attenuation,
        reads_taken: usize,
        last_channel: u8,
        units_created: usize,
        calibrations_tried: usize,
    }

    #[derive(Clone)]
    struct MockHandle {
        unit: AdcUnit,
        script: Rc<RefCell<Script>>,
    }

    /// Calibration that reports `raw` as exactly `raw` millivolts
    struct MockCalibration {
        script: Rc<RefCell<Script>>,
    }

    impl Calibration for MockCalibration {
        fn raw_to_millivolts(&self, raw: i32) -> Result<i32, AdcError> {
            if self.script.borrow().conversion_fails {
                return Err(AdcError::Conversion(-1));
            }
            Ok(raw)
        }
    }

    impl AdcHandle for MockHandle {
        type Calibration = MockCalibration;

        fn unit(&self) -> AdcUnit {
            self.unit
        }

        fn configure_channel(&self, channel: u8, attenuation: Attenuation) -> Result<(), AdcError> {
            let mut script = self.script.borrow_mut();
            script.configured.push(attenuation);
            script.last_channel = channel;
            script.current = attenuation;
            Ok(())
        }

        fn read_raw(&self, _channel: u8) -> Result<i32, AdcError> {
            let mut script = self.script.borrow_mut();
            script.reads_taken += 1;
            let index = script.current.index();
            script.reads[index].pop_front().unwrap_or(Err(AdcError::Read(-1)))
        }

        fn create_calibration(
            &self,
            _channel: u8,
            _attenuation: Attenuation,
        ) -> Result<MockCalibration, AdcError> {
            self.script.borrow_mut().calibrations_tried += 1;
            if self.script.borrow().calibration_fails {
                return Err(AdcError::Calibration(0x105));
            }
            Ok(MockCalibration {
                script: self.script.clone(),
            })
        }
    }

    struct MockBackend {
        script: Rc<RefCell<Script>>,
    }

    impl AdcBackend for MockBackend {
        type Handle = MockHandle;

        fn new_unit(&mut self, unit: AdcUnit) -> Result<MockHandle, AdcError> {
            self.script.borrow_mut().units_created += 1;
            Ok(MockHandle {
                unit,
                script: self.script.clone(),
            })
        }
    }

    fn registry(script: Script) -> (UnitRegistry<MockBackend>, Rc<RefCell<Script>>) {
        let script = Rc::new(RefCell::new(script));
        let units = UnitRegistry::new(MockBackend {
            script: script.clone(),
        });
        (units, script)
    }

    fn sensor_with(
        config: SensorConfig,
        script: Script,
    ) -> (AdcSensor<MockHandle>, Rc<RefCell<Script>>) {
        let (mut units, script) = registry(script);
        let mut sensor = AdcSensor::new(&config);
        sensor.setup(&mut units).unwrap();
        script.borrow_mut().configured.clear();
        (sensor, script)
    }

    fn fixed_config(sample_count: u8) -> SensorConfig {
        SensorConfig {
            attenuation: Attenuation::Db12,
            sample_count,
            ..SensorConfig::default()
        }
    }

    fn queue(attenuation: Attenuation, script: &mut Script, reads: &[Result<i32, AdcError>]) {
        script.reads[attenuation.index()].extend(reads.iter().copied());
    }

    #[test]
    fn test_inner_weight_peaks_at_half_scale() {
        let peak = autorange_weight(RangePosition::Inner, ADC_MAX_CODE / 2);
        for raw in (0..=ADC_MAX_CODE).step_by(7) {
            assert!(autorange_weight(RangePosition::Inner, raw) <= peak);
        }
        assert_eq!(autorange_weight(RangePosition::Inner, 0), 0.0);
        assert_eq!(autorange_weight(RangePosition::Inner, ADC_MAX_CODE), 0.0);
    }

    #[test]
    fn test_weights_never_negative() {
        for position in [RangePosition::Coarsest, RangePosition::Inner, RangePosition::Finest] {
            for raw in [-50, -1, 0, 1, 2047, 2048, 4094, 4095, 5000] {
                assert!(autorange_weight(position, raw) >= 0.0);
            }
        }
    }

    #[test]
    fn test_edge_weights_follow_rails() {
        assert_eq!(autorange_weight(RangePosition::Coarsest, 0), 0.0);
        assert_eq!(autorange_weight(RangePosition::Coarsest, 100), 100.0);
        assert_eq!(autorange_weight(RangePosition::Coarsest, ADC_MAX_CODE), HALF_SCALE);
        assert_eq!(autorange_weight(RangePosition::Finest, ADC_MAX_CODE), 0.0);
        assert_eq!(autorange_weight(RangePosition::Finest, ADC_MAX_CODE - 100), 100.0);
        assert_eq!(autorange_weight(RangePosition::Finest, 0), HALF_SCALE);
    }

    #[test]
    fn test_fuse_zero_weight_is_failure() {
        // Coarsest range at zero, nothing else probed
        let ranges = [Some(RangeReading { raw: 0, volts: 0.0 }), None, None, None];
        assert_eq!(fuse_ranges(&ranges), Err(AdcError::ZeroWeight));

        let none: [Option<RangeReading>; 4] = [None; 4];
        assert_eq!(fuse_ranges(&none), Err(AdcError::ZeroWeight));
    }

    #[test]
    fn test_fuse_favours_mid_scale_range() {
        let ranges = [
            Some(RangeReading { raw: 300, volts: 0.30 }),
            Some(RangeReading { raw: 2047, volts: 0.50 }),
            Some(RangeReading { raw: ADC_MAX_CODE, volts: 3.0 }),
            None,
        ];
        // Weights: 300, 2047, 0 (inner at the rail)
        let expected = (0.30 * 300.0 + 0.50 * 2047.0) / (300.0 + 2047.0);
        let fused = fuse_ranges(&ranges).unwrap();
        assert!((fused - expected).abs() < 1e-5);
    }

    #[test]
    fn test_fixed_average_excludes_failed_reads() {
        let mut script = Script::default();
        queue(
            Attenuation::Db12,
            &mut script,
            &[Ok(1000), Err(AdcError::Read(0x107)), Ok(1003), Ok(-1), Ok(1001)],
        );
        let (mut sensor, _) = sensor_with(fixed_config(5), script);

        // (1000 + 1003 + 1001 + 1) / 3 = 1001, calibrated 1:1 to millivolts
        let volts = sensor.read().unwrap();
        assert!((volts - 1.001).abs() < 1e-6);
    }

    #[test]
    fn test_fixed_average_rounds_half_up() {
        let mut script = Script::default();
        queue(Attenuation::Db12, &mut script, &[Ok(10), Ok(11)]);
        let (mut sensor, _) = sensor_with(
            SensorConfig {
                output_raw: true,
                ..fixed_config(2)
            },
            script,
        );

        assert_eq!(sensor.read().unwrap(), 11.0);
    }

    #[test]
    fn test_fixed_all_reads_failed_is_nan() {
        let mut script = Script::default();
        queue(
            Attenuation::Db12,
            &mut script,
            &[Err(AdcError::Read(1)), Ok(-1), Err(AdcError::Read(1))],
        );
        let (mut sensor, _) = sensor_with(fixed_config(3), script);

        assert!(sensor.sample().is_nan());
    }

    #[test]
    fn test_zero_volts_is_not_failure() {
        let mut script = Script::default();
        queue(Attenuation::Db12, &mut script, &[Ok(0)]);
        let (mut sensor, _) = sensor_with(fixed_config(1), script);

        assert_eq!(sensor.sample(), 0.0);
    }

    #[test]
    fn test_missing_calibration_uses_linear_conversion() {
        let mut script = Script {
            calibration_fails: true,
            ..Script::default()
        };
        queue(Attenuation::Db12, &mut script, &[Ok(4095)]);
        let (mut sensor, _) = sensor_with(fixed_config(1), script);

        assert!(!sensor.is_calibrated());
        assert!((sensor.read().unwrap() - FULL_SCALE_VOLTS).abs() < 1e-6);
    }

    #[test]
    fn test_failed_conversion_drops_calibration() {
        let mut script = Script {
            conversion_fails: true,
            ..Script::default()
        };
        queue(Attenuation::Db12, &mut script, &[Ok(2048)]);
        let (mut sensor, _) = sensor_with(fixed_config(1), script);
        assert!(sensor.is_calibrated());

        let volts = sensor.read().unwrap();
        assert!((volts - linear_volts(2048)).abs() < 1e-6);
        assert!(!sensor.is_calibrated());
    }

    #[test]
    fn test_zero_sample_count_is_ignored() {
        let mut script = Script::default();
        queue(Attenuation::Db12, &mut script, &[Ok(5), Ok(7)]);
        let (mut sensor, script) = sensor_with(fixed_config(2), script);

        sensor.set_sample_count(0);
        sensor.read().unwrap();
        assert_eq!(script.borrow().reads_taken, 2);
    }

    #[test]
    fn test_attenuation_change_reconfigures_channel() {
        let mut script = Script::default();
        queue(Attenuation::Db6, &mut script, &[Ok(500)]);
        let (mut sensor, script) = sensor_with(fixed_config(1), script);

        sensor.set_attenuation(Attenuation::Db6);
        assert!(sensor.needs_setup());
        sensor.read().unwrap();

        assert!(!sensor.needs_setup());
        assert_eq!(script.borrow().configured.as_slice(), &[Attenuation::Db6]);
    }

    #[test]
    fn test_read_before_setup_is_not_configured() {
        let mut sensor: AdcSensor<MockHandle> = AdcSensor::new(&SensorConfig::default());
        assert_eq!(sensor.read(), Err(AdcError::NotConfigured));
    }

    #[test]
    fn test_autorange_stops_after_saturation() {
        let mut script = Script::default();
        queue(Attenuation::Db12, &mut script, &[Ok(3000)]);
        queue(Attenuation::Db6, &mut script, &[Ok(ADC_MAX_CODE)]);
        let (mut sensor, script) = sensor_with(
            SensorConfig {
                autorange: true,
                ..SensorConfig::default()
            },
            script,
        );

        let volts = sensor.read().unwrap();

        assert_eq!(
            script.borrow().configured.as_slice(),
            &[Attenuation::Db12, Attenuation::Db6]
        );
        // Inner range at the rail has zero weight, only the 12 dB reading counts
        assert!((volts - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_autorange_probes_all_ranges_for_small_signal() {
        let mut script = Script::default();
        queue(Attenuation::Db12, &mut script, &[Ok(100)]);
        queue(Attenuation::Db6, &mut script, &[Ok(180)]);
        queue(Attenuation::Db2_5, &mut script, &[Ok(260)]);
        queue(Attenuation::Db0, &mut script, &[Ok(400)]);
        let (mut sensor, script) = sensor_with(
            SensorConfig {
                autorange: true,
                ..SensorConfig::default()
            },
            script,
        );

        let volts = sensor.read().unwrap();

        assert_eq!(script.borrow().configured.len(), 4);
        let weights = [100.0, 180.0, 260.0, HALF_SCALE];
        let volts_per_range = [0.100, 0.180, 0.260, 0.400];
        let expected = weights
            .iter()
            .zip(volts_per_range.iter())
            .map(|(w, v)| w * v)
            .sum::<f32>()
            / weights.iter().sum::<f32>();
        assert!((volts - expected).abs() < 1e-5);
    }

    #[test]
    fn test_autorange_read_failure_is_nan() {
        let mut script = Script::default();
        queue(Attenuation::Db12, &mut script, &[Ok(1000)]);
        queue(Attenuation::Db6, &mut script, &[Err(AdcError::Read(0x107))]);
        let (mut sensor, _) = sensor_with(
            SensorConfig {
                autorange: true,
                ..SensorConfig::default()
            },
            script,
        );

        assert!(sensor.sample().is_nan());
    }

    #[test]
    fn test_fixed_read_after_autorange_restores_attenuation() {
        let mut script = Script::default();
        queue(Attenuation::Db12, &mut script, &[Ok(ADC_MAX_CODE), Ok(1200)]);
        let (mut sensor, script) = sensor_with(
            SensorConfig {
                autorange: true,
                attenuation: Attenuation::Db6,
                ..SensorConfig::default()
            },
            script,
        );
        sensor.read().unwrap();

        script.borrow_mut().reads[Attenuation::Db6.index()].push_back(Ok(1200));
        sensor.set_autorange(false);
        sensor.read().unwrap();

        assert_eq!(
            script.borrow().configured.as_slice(),
            &[Attenuation::Db12, Attenuation::Db6]
        );
    }

    #[test]
    fn test_failed_calibration_is_retried_on_next_setup() {
        let (mut units, script) = registry(Script {
            calibration_fails: true,
            ..Script::default()
        });
        let mut sensor = AdcSensor::new(&fixed_config(1));

        sensor.setup(&mut units).unwrap();
        assert!(!sensor.is_calibrated());
        assert!(sensor.needs_setup());

        script.borrow_mut().calibration_fails = false;
        sensor.setup(&mut units).unwrap();

        assert!(sensor.is_calibrated());
        assert!(!sensor.needs_setup());
        assert_eq!(script.borrow().calibrations_tried, 2);

        // Nothing left to do
        sensor.setup(&mut units).unwrap();
        assert_eq!(script.borrow().calibrations_tried, 2);
    }

    #[test]
    fn test_channel_change_rederives_calibration() {
        let (mut units, script) = registry(Script::default());
        let mut sensor = AdcSensor::new(&fixed_config(1));
        sensor.setup(&mut units).unwrap();
        assert!(sensor.is_calibrated());

        sensor.set_channel(AdcUnit::Adc1, 3);
        assert!(sensor.needs_setup());
        assert!(!sensor.is_calibrated());

        sensor.setup(&mut units).unwrap();
        assert!(sensor.is_calibrated());
        assert_eq!(script.borrow().last_channel, 3);
        assert_eq!(script.borrow().calibrations_tried, 2);
        // Same unit, same handle
        assert_eq!(script.borrow().units_created, 1);
    }

    #[test]
    fn test_unit_change_acquires_new_handle() {
        let (mut units, script) = registry(Script::default());
        let mut sensor = AdcSensor::new(&fixed_config(1));
        sensor.setup(&mut units).unwrap();

        sensor.set_channel(AdcUnit::Adc2, 1);
        assert_eq!(sensor.read(), Err(AdcError::NotConfigured));

        sensor.setup(&mut units).unwrap();
        assert!(units.is_initialized(AdcUnit::Adc2));
        assert_eq!(script.borrow().units_created, 2);
        assert_eq!(script.borrow().last_channel, 1);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_sensors_on_one_unit_share_its_handle() {
        let (units, script) = registry(Script::default());
        let units: SharedRegistry<MockBackend> = std::sync::Arc::new(std::sync::Mutex::new(units));

        let mut battery = AdcSensor::new(&fixed_config(1));
        let mut other = AdcSensor::new(&SensorConfig {
            channel: 4,
            ..fixed_config(1)
        });
        battery.setup_shared(&units).unwrap();
        other.setup_shared(&units).unwrap();

        assert_eq!(script.borrow().units_created, 1);
        assert!(!battery.needs_setup());
        assert!(!other.needs_setup());
    }
}
