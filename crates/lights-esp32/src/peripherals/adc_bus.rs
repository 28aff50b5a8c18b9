//! ADC Bus - ESP-IDF oneshot driver behind the core ADC traits
//!
//! Units are created through `adc_oneshot_new_unit` and shared by every
//! sensor on the same unit via the core `UnitRegistry`. Calibration uses the
//! curve fitting scheme, the only one available on the ESP32-C6.

use std::ptr;
use std::sync::Arc;

use esp_idf_svc::sys::{self, esp, EspError};
use lights_core::adc::{AdcBackend, AdcError, AdcHandle, AdcUnit, Attenuation, Calibration};

fn unit_id(unit: AdcUnit) -> sys::adc_unit_t {
    match unit {
        AdcUnit::Adc1 => sys::adc_unit_t_ADC_UNIT_1,
        AdcUnit::Adc2 => sys::adc_unit_t_ADC_UNIT_2,
    }
}

fn atten(attenuation: Attenuation) -> sys::adc_atten_t {
    match attenuation {
        Attenuation::Db0 => sys::adc_atten_t_ADC_ATTEN_DB_0,
        Attenuation::Db2_5 => sys::adc_atten_t_ADC_ATTEN_DB_2_5,
        Attenuation::Db6 => sys::adc_atten_t_ADC_ATTEN_DB_6,
        Attenuation::Db12 => sys::adc_atten_t_ADC_ATTEN_DB_12,
    }
}

/// Owned oneshot unit, deleted when the last handle goes away
struct OneshotUnit {
    unit: AdcUnit,
    raw: sys::adc_oneshot_unit_handle_t,
}

// The oneshot driver guards its own state; the handle is only an opaque pointer.
unsafe impl Send for OneshotUnit {}
unsafe impl Sync for OneshotUnit {}

impl Drop for OneshotUnit {
    fn drop(&mut self) {
        if let Err(e) = esp!(unsafe { sys::adc_oneshot_del_unit(self.raw) }) {
            log::warn!("Failed to delete {:?} unit: {}", self.unit, e);
        }
    }
}

/// Creates oneshot units on demand
#[derive(Default)]
pub struct EspAdcBackend;

impl EspAdcBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AdcBackend for EspAdcBackend {
    type Handle = EspAdcHandle;

    fn new_unit(&mut self, unit: AdcUnit) -> Result<EspAdcHandle, AdcError> {
        let config = sys::adc_oneshot_unit_init_cfg_t {
            unit_id: unit_id(unit),
            ulp_mode: sys::adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
            ..Default::default()
        };

        let mut raw: sys::adc_oneshot_unit_handle_t = ptr::null_mut();
        esp!(unsafe { sys::adc_oneshot_new_unit(&config, &mut raw) })
            .map_err(|e: EspError| AdcError::UnitInit(e.code()))?;

        Ok(EspAdcHandle {
            inner: Arc::new(OneshotUnit { unit, raw }),
        })
    }
}

/// Shared reference to one oneshot unit
#[derive(Clone)]
pub struct EspAdcHandle {
    inner: Arc<OneshotUnit>,
}

impl AdcHandle for EspAdcHandle {
    type Calibration = CurveFitting;

    fn unit(&self) -> AdcUnit {
        self.inner.unit
    }

    fn configure_channel(&self, channel: u8, attenuation: Attenuation) -> Result<(), AdcError> {
        let config = sys::adc_oneshot_chan_cfg_t {
            atten: atten(attenuation),
            bitwidth: sys::adc_bitwidth_t_ADC_BITWIDTH_DEFAULT,
        };
        esp!(unsafe { sys::adc_oneshot_config_channel(self.inner.raw, channel as _, &config) })
            .map_err(|e| AdcError::ChannelConfig(e.code()))
    }

    fn read_raw(&self, channel: u8) -> Result<i32, AdcError> {
        let mut raw: i32 = 0;
        esp!(unsafe { sys::adc_oneshot_read(self.inner.raw, channel as _, &mut raw) })
            .map_err(|e| AdcError::Read(e.code()))?;
        Ok(raw)
    }

    fn create_calibration(
        &self,
        channel: u8,
        attenuation: Attenuation,
    ) -> Result<CurveFitting, AdcError> {
        let config = sys::adc_cali_curve_fitting_config_t {
            unit_id: unit_id(self.inner.unit),
            chan: channel as _,
            atten: atten(attenuation),
            bitwidth: sys::adc_bitwidth_t_ADC_BITWIDTH_DEFAULT,
        };

        let mut raw: sys::adc_cali_handle_t = ptr::null_mut();
        esp!(unsafe { sys::adc_cali_create_scheme_curve_fitting(&config, &mut raw) })
            .map_err(|e| AdcError::Calibration(e.code()))?;

        Ok(CurveFitting { raw })
    }
}

/// Curve fitting calibration scheme for one channel and attenuation
pub struct CurveFitting {
    raw: sys::adc_cali_handle_t,
}

unsafe impl Send for CurveFitting {}

impl Calibration for CurveFitting {
    fn raw_to_millivolts(&self, raw: i32) -> Result<i32, AdcError> {
        let mut millivolts: i32 = 0;
        esp!(unsafe { sys::adc_cali_raw_to_voltage(self.raw, raw, &mut millivolts) })
            .map_err(|e| AdcError::Conversion(e.code()))?;
        Ok(millivolts)
    }
}

impl Drop for CurveFitting {
    fn drop(&mut self) {
        if let Err(e) = esp!(unsafe { sys::adc_cali_delete_scheme_curve_fitting(self.raw) }) {
            log::warn!("Failed to delete calibration scheme: {}", e);
        }
    }
}
