//! LEDC PWM - resolution solver and channel driver
//!
//! The LEDC peripheral derives every channel's period from a shared timer.
//! A timer trades duty resolution against frequency, so the driver first
//! solves for the deepest resolution that can still reach the requested
//! frequency, then programs the timer through [`LedcHal`].

use core::fmt;

mod output;
mod solver;

pub use output::{DutyCommand, LedcOutput, SETUP_ATTEMPT_COUNT_MAX, duty_command};
pub use solver::{LOW_FREQUENCY_THRESHOLD_HZ, ResolutionSolver, hpoint_for_angle};

/// Timer programming request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerConfig {
    pub timer: u8,
    pub bit_depth: u8,
    pub frequency_hz: u32,
}

/// Channel programming request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub gpio: i32,
    pub channel: u8,
    pub timer: u8,
    pub duty: u32,
    pub hpoint: u32,
}

/// Errors reported by the PWM layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PwmError {
    /// No bit depth can produce the requested frequency
    ResolutionUnattainable { frequency_hz: f32 },
    /// Timer configuration rejected by the driver (raw error code)
    TimerCommit(i32),
    /// Channel configuration or duty update rejected (raw error code)
    Channel(i32),
    /// Output written before `setup` succeeded
    NotInitialized,
}

impl fmt::Display for PwmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PwmError::ResolutionUnattainable { frequency_hz } => {
                write!(f, "frequency {:.1} Hz can't be achieved with any bit depth", frequency_hz)
            }
            PwmError::TimerCommit(code) => write!(f, "timer configuration failed ({})", code),
            PwmError::Channel(code) => write!(f, "channel update failed ({})", code),
            PwmError::NotInitialized => write!(f, "LEDC output hasn't been initialized yet"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PwmError {}

/// Hardware seam for the LEDC peripheral (low-speed mode)
pub trait LedcHal {
    fn configure_timer(&mut self, config: &TimerConfig) -> Result<(), PwmError>;

    fn configure_channel(&mut self, config: &ChannelConfig) -> Result<(), PwmError>;

    /// Program duty and hpoint, then latch them
    fn set_duty(&mut self, channel: u8, duty: u32, hpoint: u32) -> Result<(), PwmError>;

    /// Stop the channel, holding the pin at `idle_high`
    fn stop(&mut self, channel: u8, idle_high: bool) -> Result<(), PwmError>;
}
