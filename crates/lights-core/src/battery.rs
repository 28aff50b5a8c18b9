//! Battery charge estimation and reporting

use heapless::Vec;

use crate::adc::VoltageSource;
use crate::config::BatteryConfig;

/// Maximum number of curve segments
pub const CURVE_CAPACITY: usize = 8;

/// Linear piece of the discharge curve, valid below `upper` volts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub slope: f32,
    pub offset: f32,
    /// `None` covers everything above the previous segment
    pub upper: Option<f32>,
}

impl Segment {
    pub const fn new(slope: f32, offset: f32, upper: Option<f32>) -> Self {
        Self { slope, offset, upper }
    }

    fn covers(&self, volts: f32) -> bool {
        match self.upper {
            Some(upper) if upper.is_finite() => volts < upper,
            _ => true,
        }
    }
}

/// Piecewise-linear volts to percent mapping
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryCurve {
    segments: Vec<Segment, CURVE_CAPACITY>,
}

impl Default for BatteryCurve {
    /// Single-cell Li-ion, measured at the cell
    fn default() -> Self {
        let mut segments = Vec::new();
        for segment in [
            Segment::new(0.303_030_3, 0.0, Some(3.3)),
            Segment::new(100.0, -329.0, Some(3.39)),
            Segment::new(111.111_11, -366.666_67, Some(3.75)),
            Segment::new(111.111_11, -366.666_67, Some(4.11)),
            Segment::new(111.111_11, -366.666_67, None),
        ] {
            // Five segments always fit.
            let _ = segments.push(segment);
        }
        Self { segments }
    }
}

impl BatteryCurve {
    /// Build a curve from segments ordered by their upper bound
    ///
    /// Returns `None` when there are more than [`CURVE_CAPACITY`] segments.
    pub fn from_segments(segments: &[Segment]) -> Option<Self> {
        Vec::from_slice(segments).ok().map(|segments| Self { segments })
    }

    /// Unclamped percentage for `volts`; NaN when no segment covers it
    pub fn percent(&self, volts: f32) -> f32 {
        self.segments
            .iter()
            .find(|segment| segment.covers(volts))
            .map(|segment| volts * segment.slope + segment.offset)
            .unwrap_or(f32::NAN)
    }
}

/// Destination for the remaining-charge attribute
pub trait AttributeSink {
    /// `value` is in half-percent units (0..=200)
    fn publish(&mut self, value: u8);
}

/// Samples the battery voltage and publishes the remaining charge
pub struct BatteryMonitor<S: VoltageSource, P: AttributeSink> {
    source: S,
    sink: P,
    divider: f32,
    curve: BatteryCurve,
}

impl<S: VoltageSource, P: AttributeSink> BatteryMonitor<S, P> {
    pub fn new(source: S, sink: P, config: &BatteryConfig) -> Self {
        Self {
            source,
            sink,
            divider: config.divider,
            curve: config.curve.clone(),
        }
    }

    /// Take one reading and publish it
    ///
    /// Returns the published value, or `None` when the reading failed.
    pub fn tick(&mut self) -> Option<u8> {
        let volts = self.source.sample() * self.divider;
        if volts.is_nan() {
            log::warn!("Battery voltage unavailable, not reporting");
            return None;
        }

        let percent = self.curve.percent(volts);
        if percent.is_nan() {
            log::warn!("Battery voltage {:.3} V outside of the discharge curve", volts);
            return None;
        }
        let percent = percent.clamp(0.0, 100.0);
        log::info!("Battery at {:.3} V, {:.1}%", volts, percent);

        let value = (percent * 2.0 + 0.5) as u8;
        self.sink.publish(value);
        Some(value)
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    struct FixedVolts(f32);

    impl VoltageSource for FixedVolts {
        fn sample(&mut self) -> f32 {
            self.0
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<u8>);

    impl AttributeSink for Recorder {
        fn publish(&mut self, value: u8) {
            self.0.push(value);
        }
    }

    fn monitor(pin_volts: f32) -> BatteryMonitor<FixedVolts, Recorder> {
        BatteryMonitor::new(FixedVolts(pin_volts), Recorder::default(), &BatteryConfig::default())
    }

    #[test]
    fn test_curve_values() {
        let curve = BatteryCurve::default();
        assert!((curve.percent(3.0) - 0.909).abs() < 1e-3);
        assert!((curve.percent(3.35) - 6.0).abs() < 1e-3);
        assert!((curve.percent(3.6) - 33.333).abs() < 1e-2);
        assert!((curve.percent(4.2) - 100.0).abs() < 1e-2);
    }

    #[test]
    fn test_segment_upper_bound_is_exclusive() {
        let curve = BatteryCurve::default();
        // 3.39 V belongs to the third segment: 111.11 * 3.39 - 366.67
        assert!((curve.percent(3.39) - 10.0).abs() < 1e-2);
    }

    #[test]
    fn test_tick_publishes_half_percent_units() {
        let mut battery = monitor(2.1);

        assert_eq!(battery.tick(), Some(200));
        assert_eq!(battery.sink().0, [200]);
    }

    #[test]
    fn test_tick_clamps_to_range() {
        assert_eq!(monitor(2.5).tick(), Some(200));
        assert_eq!(monitor(0.0).tick(), Some(0));
    }

    #[test]
    fn test_midrange_reading() {
        // 1.8 V at the pin, 3.6 V at the cell: a third of the charge left
        assert_eq!(monitor(1.8).tick(), Some(67));
    }

    #[test]
    fn test_nan_reading_publishes_nothing() {
        let mut battery = monitor(f32::NAN);

        assert_eq!(battery.tick(), None);
        assert!(battery.sink().0.is_empty());
    }

    #[test]
    fn test_custom_curve_capacity() {
        let segments = [Segment::new(1.0, 0.0, None); CURVE_CAPACITY + 1];
        assert!(BatteryCurve::from_segments(&segments[..CURVE_CAPACITY]).is_some());
        assert!(BatteryCurve::from_segments(&segments).is_none());
    }
}
