// Platform-agnostic on/off output
pub trait BinaryOutput: Send {
    /// Drive the pin; `state` is the physical level, inversion already applied
    fn write_state(&mut self, state: bool);

    fn is_inverted(&self) -> bool {
        false
    }

    fn turn_on(&mut self) {
        let state = !self.is_inverted();
        self.write_state(state);
    }

    fn turn_off(&mut self) {
        let state = self.is_inverted();
        self.write_state(state);
    }

    fn set_state(&mut self, state: bool) {
        if state {
            self.turn_on();
        } else {
            self.turn_off();
        }
    }
}

/// Lights an indicator for the duration of an operation
pub struct StatusIndicator<'a> {
    led: &'a mut dyn BinaryOutput,
}

impl<'a> StatusIndicator<'a> {
    pub fn new(led: &'a mut dyn BinaryOutput) -> Self {
        Self { led }
    }

    pub fn pulse<R>(&mut self, op: impl FnOnce() -> R) -> R {
        self.led.turn_on();
        let result = op();
        self.led.turn_off();
        result
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    struct RecordingPin {
        inverted: bool,
        writes: Vec<bool>,
    }

    impl BinaryOutput for RecordingPin {
        fn write_state(&mut self, state: bool) {
            self.writes.push(state);
        }

        fn is_inverted(&self) -> bool {
            self.inverted
        }
    }

    #[test]
    fn test_plain_output() {
        let mut pin = RecordingPin { inverted: false, writes: Vec::new() };
        pin.turn_on();
        pin.turn_off();
        pin.set_state(true);
        assert_eq!(pin.writes, [true, false, true]);
    }

    #[test]
    fn test_inverted_output() {
        let mut pin = RecordingPin { inverted: true, writes: Vec::new() };
        pin.turn_on();
        pin.set_state(false);
        assert_eq!(pin.writes, [false, true]);
    }

    #[test]
    fn test_indicator_pulses_around_operation() {
        let mut pin = RecordingPin { inverted: false, writes: Vec::new() };
        let value = StatusIndicator::new(&mut pin).pulse(|| 7);
        assert_eq!(value, 7);
        assert_eq!(pin.writes, [true, false]);
    }
}
