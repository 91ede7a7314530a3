//! Randomised delay applied before each tracking call.

use std::thread;
use std::time::Duration;

use rand::Rng;

/// Uniform delay in `[min, max)` that spreads bursts of concurrent logging
/// calls against a shared backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    /// Pacing with the given bounds; swapped bounds are reordered.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draws the next delay.
    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..self.max)
    }

    /// Sleeps for the next delay.
    pub fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(Duration::from_millis(150), Duration::from_millis(170))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delay_stays_in_bounds() {
        let pacing = Pacing::default();
        for _ in 0..100 {
            let delay = pacing.next_delay();
            assert!(delay >= Duration::from_millis(150));
            assert!(delay < Duration::from_millis(170));
        }
    }

    #[test]
    fn none_never_sleeps() {
        assert_eq!(Pacing::none().next_delay(), Duration::ZERO);
    }
}
