//! Sleep inhibition
//!
//! While at least one [`Wakelock`] is alive the device must not enter light
//! sleep; otherwise the LEDC timers stop mid-fade. Guards release themselves
//! on drop, so every acquisition is balanced by exactly one release.
//!
//! A [`PowerLock`] attached to the inhibitor is taken before `acquire`
//! returns and given back when the guard drops, so the platform's sleep
//! policy never lags behind the count.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

/// Platform lock that keeps the chip out of light sleep
///
/// Calls are counted: every `acquire` is followed by exactly one `release`,
/// but acquisitions from different guards may nest.
pub trait PowerLock: Send + Sync {
    fn acquire(&self);
    fn release(&self);
}

#[derive(Default)]
struct Shared {
    count: AtomicU32,
    lock: Option<Box<dyn PowerLock>>,
}

/// Shared counter of live wakelocks
#[derive(Clone, Default)]
pub struct SleepInhibitor {
    shared: Arc<Shared>,
}

impl SleepInhibitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inhibitor that drives `lock` from every acquire and release
    pub fn with_power_lock(lock: impl PowerLock + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                count: AtomicU32::new(0),
                lock: Some(Box::new(lock)),
            }),
        }
    }

    pub fn acquire(&self) -> Wakelock {
        if let Some(lock) = &self.shared.lock {
            lock.acquire();
        }
        let count = self.shared.count.fetch_add(1, Ordering::AcqRel) + 1;
        if count == 1 {
            log::info!("Light sleep inhibited");
        }
        log::debug!("Wakelock acquired ({} held)", count);
        Wakelock {
            shared: self.shared.clone(),
        }
    }

    pub fn is_inhibited(&self) -> bool {
        self.count() > 0
    }

    pub fn count(&self) -> u32 {
        self.shared.count.load(Ordering::Acquire)
    }
}

impl fmt::Debug for SleepInhibitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SleepInhibitor")
            .field("count", &self.count())
            .field("power_lock", &self.shared.lock.is_some())
            .finish()
    }
}

/// Keeps the device awake until dropped
///
/// Not `Clone`: moving a guard transfers the obligation to release.
#[must_use = "the wakelock is released as soon as it is dropped"]
pub struct Wakelock {
    shared: Arc<Shared>,
}

impl Wakelock {
    /// Release explicitly; equivalent to dropping
    pub fn release(self) {}
}

impl fmt::Debug for Wakelock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wakelock").finish_non_exhaustive()
    }
}

impl Drop for Wakelock {
    fn drop(&mut self) {
        let previous = self
            .shared
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1));
        let Ok(previous) = previous else {
            log::warn!("Wakelock released with no holders");
            return;
        };

        log::debug!("Wakelock released ({} held)", previous - 1);
        if previous == 1 {
            log::info!("Light sleep allowed");
        }
        if let Some(lock) = &self.shared.lock {
            lock.release();
        }
    }
}
