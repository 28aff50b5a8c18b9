//! Fade controller
//!
//! Consumes on/off and level requests and walks the output one level unit at
//! a time towards the target, pausing between steps. Only one transition
//! runs at a time; a request that arrives mid-transition is picked up after
//! it finishes.

use embedded_hal::delay::DelayNs;

use crate::config::FadeConfig;
use crate::ledc::{LedcHal, LedcOutput, PwmError};
use crate::wakelock::{SleepInhibitor, Wakelock};

/// Full brightness in level units
pub const LEVEL_MAX: u8 = u8::MAX;

/// A command for the fade controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeRequest {
    OnOff(bool),
    Level(u8),
}

/// Something whose brightness can be set in `0.0..=1.0`
pub trait Dimmer {
    type Error: core::fmt::Display;

    /// Bring the output up before a transition
    fn prepare(&mut self) -> Result<(), Self::Error>;

    fn set_level(&mut self, level: f32) -> Result<(), Self::Error>;
}

impl<H: LedcHal> Dimmer for LedcOutput<H> {
    type Error = PwmError;

    // Peripheral state may be lost across light sleep, so every transition
    // reprograms the timer.
    fn prepare(&mut self) -> Result<(), PwmError> {
        self.setup()
    }

    fn set_level(&mut self, level: f32) -> Result<(), PwmError> {
        LedcOutput::set_level(self, level)
    }
}

pub struct FadeController<D: Dimmer, T: DelayNs> {
    dimmer: D,
    delay: T,
    inhibitor: SleepInhibitor,
    wakelock: Option<Wakelock>,
    step_delay_ms: u32,

    level: u8,
    saved_level: u8,
}

impl<D: Dimmer, T: DelayNs> FadeController<D, T> {
    pub fn new(dimmer: D, delay: T, inhibitor: SleepInhibitor, config: &FadeConfig) -> Self {
        Self {
            dimmer,
            delay,
            inhibitor,
            wakelock: None,
            step_delay_ms: config.step_delay_ms,
            level: 0,
            saved_level: 0,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Level restored by the next "on"
    pub fn saved_level(&self) -> u8 {
        self.saved_level
    }

    pub fn holds_wakelock(&self) -> bool {
        self.wakelock.is_some()
    }

    pub fn dimmer(&self) -> &D {
        &self.dimmer
    }

    fn target_for(&mut self, request: FadeRequest) -> u8 {
        match request {
            FadeRequest::OnOff(true) => self.saved_level,
            FadeRequest::OnOff(false) => {
                self.saved_level = self.level;
                0
            }
            FadeRequest::Level(level) => level,
        }
    }

    /// Run one request to completion
    pub fn handle(&mut self, request: FadeRequest) {
        let target = self.target_for(request);
        log::debug!("Fading {} -> {} ({:?})", self.level, target, request);

        if self.level == 0 && target == 0 {
            return;
        }

        if self.wakelock.is_none() {
            self.wakelock = Some(self.inhibitor.acquire());
        }
        if let Err(e) = self.dimmer.prepare() {
            log::error!("Failed to prepare output: {}", e);
        }

        let mut current = self.level;
        loop {
            if let Err(e) = self.dimmer.set_level(current as f32 / LEVEL_MAX as f32) {
                log::warn!("Failed to set level {}: {}", current, e);
            }
            self.delay.delay_ms(self.step_delay_ms);

            if current == target {
                break;
            }
            current = if current < target { current + 1 } else { current - 1 };
        }
        self.level = target;

        if self.level == 0 {
            self.wakelock = None;
        }
    }

    /// Serve requests until every sender is gone
    #[cfg(feature = "std")]
    pub fn run(&mut self, requests: crate::mailbox::FadeReceiver) {
        while let Some(request) = requests.recv() {
            self.handle(request);
        }
        log::info!("Fade mailbox closed, stopping");
    }
}
