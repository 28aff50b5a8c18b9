use super::PwmError;

/// Below this target frequency the timer is fed from the slow clock path,
/// which changes the usable divider range
pub const LOW_FREQUENCY_THRESHOLD_HZ: f32 = 100.0;

/// Picks the duty resolution for a target PWM frequency
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionSolver {
    /// Timer source clock
    pub clock_hz: f32,
    /// Widest duty resolution the timer supports
    pub max_res_bits: u8,
}

impl Default for ResolutionSolver {
    /// ESP32-C6: 80 MHz APB clock, 20-bit timers
    fn default() -> Self {
        Self {
            clock_hz: 80e6,
            max_res_bits: 20,
        }
    }
}

impl ResolutionSolver {
    pub fn max_frequency(&self, bit_depth: u8) -> f32 {
        self.clock_hz / (1u32 << bit_depth) as f32
    }

    pub fn min_frequency(&self, bit_depth: u8, low_frequency: bool) -> f32 {
        let divider_steps = if low_frequency { 32.0 } else { 256.0 };
        let max_divider = ((1u32 << self.max_res_bits) - 1) as f32 / divider_steps;
        self.clock_hz / (max_divider * (1u32 << bit_depth) as f32)
    }

    /// Deepest bit depth whose frequency window contains `frequency`
    pub fn bit_depth_for(&self, frequency: f32) -> Option<u8> {
        log::trace!("Calculating resolution bit-depth for frequency {}", frequency);
        let low_frequency = frequency < LOW_FREQUENCY_THRESHOLD_HZ;
        (1..=self.max_res_bits).rev().find(|&bits| {
            self.min_frequency(bits, low_frequency) <= frequency
                && frequency <= self.max_frequency(bits)
        })
    }

    pub fn solve(&self, frequency: f32) -> Result<u8, PwmError> {
        self.bit_depth_for(frequency)
            .ok_or(PwmError::ResolutionUnattainable { frequency_hz: frequency })
    }
}

/// Start offset of the duty pulse for a phase angle in degrees
pub fn hpoint_for_angle(angle: f32, bit_depth: u8) -> u32 {
    let max_duty = ((1u32 << bit_depth) - 1) as f64;
    (angle as f64 * max_duty / 360.0) as u32
}
