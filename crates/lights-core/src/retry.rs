//! Bounded retry with a monotonically relaxed parameter

/// Retries an operation a bounded number of times, relaxing its parameter
/// between attempts (e.g. one bit less of PWM resolution)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u8,
}

/// Result of the final attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempted<T, P> {
    pub outcome: T,
    /// Parameter used by the final attempt
    pub parameter: P,
    pub attempts: u8,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u8) -> Self {
        Self { max_attempts }
    }

    /// Run `op` with `initial`, then with `relax(previous)` after each
    /// failure
    ///
    /// Stops after the first success, after `max_attempts`, or when `relax`
    /// has nothing left to offer. The error of the last attempt is returned
    /// together with the parameter it used.
    pub fn run<P, T, E>(
        &self,
        initial: P,
        mut relax: impl FnMut(P) -> Option<P>,
        mut op: impl FnMut(P) -> Result<T, E>,
    ) -> Attempted<Result<T, E>, P>
    where
        P: Copy,
    {
        let mut parameter = initial;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = op(parameter);
            if outcome.is_ok() || attempts >= self.max_attempts {
                return Attempted {
                    outcome,
                    parameter,
                    attempts,
                };
            }
            match relax(parameter) {
                Some(next) => parameter = next,
                None => {
                    return Attempted {
                        outcome,
                        parameter,
                        attempts,
                    };
                }
            }
        }
    }
}
