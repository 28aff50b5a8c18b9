//! ADC sampling - unit registry, sensor channels and the hardware seam
//!
//! Conversion hardware is reached through two traits so the sampling logic
//! can run against the ESP-IDF oneshot driver on the device and against
//! mocks on the host:
//! - [`AdcBackend`] creates the exclusive per-unit conversion handles
//! - [`AdcHandle`] configures channels, reads raw codes and builds
//!   calibration schemes for one unit
//!
//! Handles are shared between every sensor on the same unit through the
//! [`UnitRegistry`].

use core::fmt;

mod registry;
mod sensor;

pub use registry::UnitRegistry;
#[cfg(feature = "std")]
pub use registry::SharedRegistry;
pub use sensor::{
    AdcSensor, RangePosition, RangeReading, autorange_weight, fuse_ranges, linear_volts,
};

/// Highest code produced by the 12-bit converter
pub const ADC_MAX_CODE: i32 = 4095;

/// Input voltage assumed at [`ADC_MAX_CODE`] when no calibration is available
pub const FULL_SCALE_VOLTS: f32 = 3.3;

/// Code some drivers report for a conversion that produced no data
pub const INVALID_CODE: i32 = -1;

/// Physical conversion unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdcUnit {
    Adc1,
    Adc2,
}

/// Input attenuation, i.e. the measurable voltage range of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Attenuation {
    #[default]
    Db0,
    Db2_5,
    Db6,
    Db12,
}

impl Attenuation {
    /// Order in which autoranging probes the ranges, widest first
    pub const AUTORANGE_ORDER: [Attenuation; 4] = [
        Attenuation::Db12,
        Attenuation::Db6,
        Attenuation::Db2_5,
        Attenuation::Db0,
    ];

    /// Stable index, used for per-range tables
    pub fn index(self) -> usize {
        match self {
            Attenuation::Db0 => 0,
            Attenuation::Db2_5 => 1,
            Attenuation::Db6 => 2,
            Attenuation::Db12 => 3,
        }
    }
}

/// Errors reported by the ADC layer
///
/// Variants carrying an `i32` hold the driver's raw error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcError {
    /// Conversion unit could not be created
    UnitInit(i32),
    /// Channel could not be configured on its unit
    ChannelConfig(i32),
    /// A single conversion failed
    Read(i32),
    /// A conversion returned the invalid sentinel code
    InvalidCode,
    /// Calibration scheme could not be created
    Calibration(i32),
    /// Calibrated raw-to-voltage conversion failed
    Conversion(i32),
    /// Every conversion in a batch failed
    NoValidSamples,
    /// Autorange weights summed to zero
    ZeroWeight,
    /// Sensor has no unit handle yet; `setup` has not succeeded
    NotConfigured,
}

impl fmt::Display for AdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdcError::UnitInit(code) => write!(f, "unit init failed ({})", code),
            AdcError::ChannelConfig(code) => write!(f, "channel config failed ({})", code),
            AdcError::Read(code) => write!(f, "read failed ({})", code),
            AdcError::InvalidCode => write!(f, "invalid ADC code"),
            AdcError::Calibration(code) => write!(f, "calibration scheme failed ({})", code),
            AdcError::Conversion(code) => write!(f, "calibrated conversion failed ({})", code),
            AdcError::NoValidSamples => write!(f, "all ADC readings failed"),
            AdcError::ZeroWeight => write!(f, "autorange weights sum to zero"),
            AdcError::NotConfigured => write!(f, "sensor not set up"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AdcError {}

/// Creates conversion units
pub trait AdcBackend {
    type Handle: AdcHandle;

    /// Initialize `unit` (mode, clock source) and return its handle
    fn new_unit(&mut self, unit: AdcUnit) -> Result<Self::Handle, AdcError>;
}

/// One initialized conversion unit
///
/// Clones refer to the same unit.
pub trait AdcHandle: Clone {
    type Calibration: Calibration;

    fn unit(&self) -> AdcUnit;

    fn configure_channel(&self, channel: u8, attenuation: Attenuation) -> Result<(), AdcError>;

    /// Single raw conversion on an already configured channel
    fn read_raw(&self, channel: u8) -> Result<i32, AdcError>;

    fn create_calibration(
        &self,
        channel: u8,
        attenuation: Attenuation,
    ) -> Result<Self::Calibration, AdcError>;
}

/// Calibration scheme valid for one unit, channel and attenuation
///
/// Dropping the scheme releases it.
pub trait Calibration {
    fn raw_to_millivolts(&self, raw: i32) -> Result<i32, AdcError>;
}

/// Anything that produces a voltage reading, NaN when no reading was possible
pub trait VoltageSource {
    fn sample(&mut self) -> f32;
}
