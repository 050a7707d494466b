//! Rate limiting between deliveries.
//!
//! Messages to the same target are spaced by a delay that grows linearly
//! with the target's position in the list, from `min` for the first target
//! towards `max` for the last. Consecutive targets are always separated by
//! the full `max` delay.

use std::time::Duration;

/// Delay between two messages sent to the same target.
///
/// `min + (max - min) * (target_index / total_targets)`, in seconds.
/// Non-decreasing in `target_index` and equal to `min` at index 0.
/// `total_targets` must be non-zero; zero yields `min`.
pub fn delay_between_messages(
    min_delay: f64,
    max_delay: f64,
    target_index: usize,
    total_targets: usize,
) -> Duration {
    debug_assert!(total_targets > 0, "scheduler needs at least one target");
    if total_targets == 0 {
        return seconds(min_delay);
    }
    let fraction = target_index as f64 / total_targets as f64;
    seconds(min_delay + (max_delay - min_delay) * fraction)
}

fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// Delay bounds for one job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSchedule {
    min_delay: f64,
    max_delay: f64,
}

impl RateSchedule {
    /// Build a schedule. Callers validate `0 <= min <= max` beforehand (see `JobConfig::validate`).
    pub fn new(min_delay: f64, max_delay: f64) -> Self {
        Self {
            min_delay,
            max_delay,
        }
    }

    pub fn between_messages(&self, target_index: usize, total_targets: usize) -> Duration {
        delay_between_messages(self.min_delay, self.max_delay, target_index, total_targets)
    }

    pub fn between_targets(&self) -> Duration {
        seconds(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_target_gets_min_delay() {
        assert_eq!(delay_between_messages(5.0, 10.0, 0, 4), Duration::from_secs(5));
    }

    #[test]
    fn test_linear_interpolation() {
        assert_eq!(delay_between_messages(5.0, 10.0, 2, 4), Duration::from_secs_f64(7.5));
        // The last index never quite reaches max.
        assert_eq!(delay_between_messages(0.0, 10.0, 4, 5), Duration::from_secs(8));
    }

    #[test]
    fn test_monotonic_over_all_indices() {
        for (min, max, total) in [(0.0, 0.0, 1), (1.0, 3.0, 7), (2.5, 2.5, 3), (0.0, 60.0, 50)] {
            let mut previous = Duration::ZERO;
            for index in 0..total {
                let delay = delay_between_messages(min, max, index, total);
                assert!(delay >= previous, "decreased at index {}", index);
                previous = delay;
            }
            assert_eq!(delay_between_messages(min, max, 0, total), Duration::from_secs_f64(min));
        }
    }

    #[test]
    fn test_zero_bounds_are_zero() {
        let schedule = RateSchedule::new(0.0, 0.0);
        assert_eq!(schedule.between_messages(1, 2), Duration::ZERO);
        assert_eq!(schedule.between_targets(), Duration::ZERO);
    }

    #[test]
    fn test_between_targets_is_max() {
        let schedule = RateSchedule::new(1.0, 4.0);
        assert_eq!(schedule.between_targets(), Duration::from_secs(4));
    }

    #[test]
    fn test_huge_delay_saturates() {
        let schedule = RateSchedule::new(0.0, 1e20);
        assert_eq!(schedule.between_targets(), Duration::MAX);
        assert_eq!(schedule.between_messages(1, 2), Duration::MAX);
        assert_eq!(schedule.between_messages(0, 2), Duration::ZERO);
    }

    #[test]
    fn test_non_finite_clamps_to_zero() {
        assert_eq!(delay_between_messages(f64::NAN, 1.0, 0, 1), Duration::ZERO);
    }
}
