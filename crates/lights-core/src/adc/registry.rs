#[cfg(feature = "std")]
use std::sync::{Arc, Mutex};

use heapless::LinearMap;

use super::{AdcBackend, AdcError, AdcUnit};

/// Number of physical conversion units on the chip
const UNIT_COUNT: usize = 2;

/// The one registry of a process, shared by every sensor task
#[cfg(feature = "std")]
pub type SharedRegistry<B> = Arc<Mutex<UnitRegistry<B>>>;

/// Lazily populated map from physical unit to its single handle
///
/// The first `acquire` for a unit initializes it through the backend; later
/// calls hand out clones of the cached handle. A failed initialization
/// leaves the slot empty so the next caller retries.
///
/// Creation is serialized by `&mut self`, and across tasks by the mutex of
/// a [`SharedRegistry`]. Conversions through the handles are not: two tasks
/// sampling channels of the same unit at once must be kept apart by the
/// caller.
pub struct UnitRegistry<B: AdcBackend> {
    backend: B,
    units: LinearMap<AdcUnit, B::Handle, UNIT_COUNT>,
}

impl<B: AdcBackend> UnitRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            units: LinearMap::new(),
        }
    }

    /// Get the handle for `unit`, initializing the unit on first use
    pub fn acquire(&mut self, unit: AdcUnit) -> Result<B::Handle, AdcError> {
        if let Some(handle) = self.units.get(&unit) {
            log::trace!("Reusing {:?} handle", unit);
            return Ok(handle.clone());
        }

        let handle = self.backend.new_unit(unit).inspect_err(|e| {
            log::error!("Error initializing {:?} unit: {}", unit, e);
        })?;

        // At most UNIT_COUNT distinct keys exist, so the map cannot be full.
        let _ = self.units.insert(unit, handle.clone());
        log::info!("{:?} unit initialized", unit);
        Ok(handle)
    }

    pub fn is_initialized(&self, unit: AdcUnit) -> bool {
        self.units.contains_key(&unit)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(feature = "std")]
    pub fn shared(backend: B) -> SharedRegistry<B> {
        Arc::new(Mutex::new(Self::new(backend)))
    }
}
