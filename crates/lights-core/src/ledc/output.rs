use super::{ChannelConfig, LedcHal, PwmError, ResolutionSolver, TimerConfig, hpoint_for_angle};
use crate::config::OutputConfig;
use crate::retry::RetryPolicy;

/// Timer configuration attempts before giving up, each one bit shallower
pub const SETUP_ATTEMPT_COUNT_MAX: u8 = 5;

/// Hardware operation selected for a duty value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DutyCommand {
    /// Stop the channel with the pin held low
    StopLow,
    /// Stop the channel with the pin held high
    StopHigh,
    /// Regular duty + hpoint update
    Duty { duty: u32, hpoint: u32 },
}

/// Map a (post-inversion) output state to the operation that realizes it
///
/// The rails are handled as stop states; driving them through the duty
/// path glitches on some timer implementations.
pub fn duty_command(state: f32, bit_depth: u8, hpoint: u32) -> DutyCommand {
    let max_duty = (1u32 << bit_depth) - 1;
    // Round half up; the product is never negative after clamping.
    let duty = (state.clamp(0.0, 1.0) * max_duty as f32 + 0.5) as u32;
    if duty >= max_duty {
        DutyCommand::StopHigh
    } else if duty == 0 {
        DutyCommand::StopLow
    } else {
        DutyCommand::Duty { duty, hpoint }
    }
}

/// One dimmable LEDC output
///
/// Channels `2n` and `2n + 1` share timer `n`; reprogramming the frequency
/// of one affects the other.
pub struct LedcOutput<H: LedcHal> {
    hal: H,
    solver: ResolutionSolver,
    retry: RetryPolicy,

    gpio: i32,
    channel: u8,
    frequency: f32,
    phase_angle: f32,
    inverted: bool,
    min_power: f32,
    max_power: f32,
    zero_means_zero: bool,

    bit_depth: u8,
    /// Last written state before inversion
    state: f32,
    initialized: bool,
}

impl<H: LedcHal> LedcOutput<H> {
    pub fn new(hal: H, config: &OutputConfig) -> Self {
        Self {
            hal,
            solver: ResolutionSolver::default(),
            retry: RetryPolicy::new(SETUP_ATTEMPT_COUNT_MAX),
            gpio: config.gpio,
            channel: config.channel,
            frequency: config.frequency_hz,
            phase_angle: config.phase_angle,
            inverted: config.inverted,
            min_power: config.min_power,
            max_power: config.max_power,
            zero_means_zero: config.zero_means_zero,
            bit_depth: 0,
            state: 0.0,
            initialized: false,
        }
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Last written state in `0.0..=1.0`, before inversion
    pub fn state(&self) -> f32 {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    fn timer(&self) -> u8 {
        (self.channel % 8) / 2
    }

    fn hal_channel(&self) -> u8 {
        self.channel % 8
    }

    fn hpoint(&self) -> u32 {
        hpoint_for_angle(self.phase_angle, self.bit_depth)
    }

    /// Solve the resolution for `frequency` and program the timer, one bit
    /// shallower per rejected attempt
    fn commit_timer(&mut self, frequency: f32) -> Result<u8, PwmError> {
        let bit_depth = self
            .solver
            .solve(frequency)
            .inspect_err(|e| log::error!("{}", e))?;

        let timer = self.timer();
        let retry = self.retry;
        let hal = &mut self.hal;
        let attempted = retry.run(
            bit_depth,
            |bits| bits.checked_sub(1).filter(|bits| *bits >= 1),
            |bits| {
                hal.configure_timer(&TimerConfig {
                    timer,
                    bit_depth: bits,
                    frequency_hz: frequency as u32,
                })
                .inspect_err(|e| {
                    log::warn!(
                        "Unable to initialize timer with frequency {:.1} and bit depth of {}: {}",
                        frequency,
                        bits,
                        e
                    )
                })
            },
        );

        match attempted.outcome {
            Ok(()) => {
                self.bit_depth = attempted.parameter;
                Ok(attempted.parameter)
            }
            Err(e) => {
                log::error!(
                    "Frequency {:.1} can't be achieved with computed bit depth {}",
                    frequency,
                    bit_depth
                );
                Err(e)
            }
        }
    }

    /// Program the timer and attach the channel, starting in the off state
    pub fn setup(&mut self) -> Result<(), PwmError> {
        log::trace!("Entering LEDC setup...");
        self.commit_timer(self.frequency)?;

        let hpoint = self.hpoint();
        log::debug!(
            "Configured frequency {:.1} with a bit depth of {} bits, angle {:.1} gives hpoint {}",
            self.frequency,
            self.bit_depth,
            self.phase_angle,
            hpoint
        );

        let off_duty = if self.inverted { 1u32 << self.bit_depth } else { 0 };
        self.hal.configure_channel(&ChannelConfig {
            gpio: self.gpio,
            channel: self.hal_channel(),
            timer: self.timer(),
            duty: off_duty,
            hpoint,
        })?;

        self.initialized = true;
        Ok(())
    }

    /// Drive the output at `state` in `0.0..=1.0`
    pub fn write_state(&mut self, state: f32) -> Result<(), PwmError> {
        if !self.initialized {
            log::warn!("LEDC output hasn't been initialized yet!");
            return Err(PwmError::NotInitialized);
        }

        let state = if state.is_nan() { 0.0 } else { state.clamp(0.0, 1.0) };
        self.state = state;
        let physical = if self.inverted { 1.0 - state } else { state };

        let channel = self.hal_channel();
        match duty_command(physical, self.bit_depth, self.hpoint()) {
            DutyCommand::StopHigh => self.hal.stop(channel, true),
            DutyCommand::StopLow => self.hal.stop(channel, false),
            DutyCommand::Duty { duty, hpoint } => {
                log::trace!("Setting duty: {} on channel {}", duty, self.channel);
                self.hal.set_duty(channel, duty, hpoint)
            }
        }
    }

    /// Map a brightness level into the configured power range and write it
    pub fn set_level(&mut self, level: f32) -> Result<(), PwmError> {
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        let power = if level == 0.0 && self.zero_means_zero {
            0.0
        } else {
            self.min_power + level * (self.max_power - self.min_power)
        };
        self.write_state(power)
    }

    /// Change the PWM frequency at runtime, keeping the current brightness
    ///
    /// Before `setup` the frequency is only recorded.
    pub fn update_frequency(&mut self, frequency: f32) -> Result<(), PwmError> {
        if !self.initialized {
            self.solver.solve(frequency).inspect_err(|e| log::error!("{}", e))?;
            self.frequency = frequency;
            log::warn!("LEDC output hasn't been initialized yet!");
            return Ok(());
        }

        self.commit_timer(frequency)?;
        self.frequency = frequency;
        self.write_state(self.state)
    }

    pub fn dump_config(&self) {
        let low = self.frequency < super::LOW_FREQUENCY_THRESHOLD_HZ;
        log::info!("LEDC Output:");
        log::info!("  Pin: GPIO{}", self.gpio);
        log::info!("  LEDC Channel: {}", self.channel);
        log::info!("  PWM Frequency: {:.1} Hz", self.frequency);
        log::info!("  Phase angle: {:.1}°", self.phase_angle);
        log::info!("  Bit depth: {}", self.bit_depth);
        for bits in [self.bit_depth.saturating_sub(1), self.bit_depth, self.bit_depth + 1] {
            if bits == 0 || bits > self.solver.max_res_bits {
                continue;
            }
            log::debug!(
                "  {} bits: {:.3} Hz .. {:.1} Hz",
                bits,
                self.solver.min_frequency(bits, low),
                self.solver.max_frequency(bits)
            );
        }
        log::debug!("  Max res bits: {}", self.solver.max_res_bits);
        log::debug!("  Clock frequency: {:.0}", self.solver.clock_hz);
    }
}
