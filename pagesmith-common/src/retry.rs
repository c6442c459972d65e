//! Bounded-attempt backoff schedules.
//!
//! Retry loops in the daemon (evaluator notification, revision polling)
//! share this schedule so the delay sequence is computable and assertable
//! in tests, independent of how the caller sleeps.

use std::time::Duration;

/// A bounded retry schedule with a computable delay sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    /// 1 yields a fixed interval, 2 doubles.
    pub factor: u32,
}

impl BackoffSchedule {
    /// Exponential schedule: `base, base*2, base*4, ...`.
    pub const fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            factor: 2,
        }
    }

    /// Fixed-interval schedule: `base, base, base, ...`.
    pub const fn fixed(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            factor: 1,
        }
    }

    /// Delay to wait after attempt `attempt` fails (0-based). `None` when
    /// no further attempt remains.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }
        let multiplier = self.factor.checked_pow(attempt).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(multiplier))
    }

    /// The full delay sequence, one entry per inter-attempt gap.
    pub fn delays(&self) -> Vec<Duration> {
        (0..self.max_attempts)
            .filter_map(|attempt| self.delay_after(attempt))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_delays_double() {
        let schedule = BackoffSchedule::exponential(5, Duration::from_secs(1));
        assert_eq!(
            schedule.delays(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn no_delay_after_final_attempt() {
        let schedule = BackoffSchedule::exponential(3, Duration::from_secs(1));
        assert_eq!(schedule.delay_after(2), None);
    }

    #[test]
    fn fixed_schedule_repeats_base() {
        let schedule = BackoffSchedule::fixed(4, Duration::from_millis(250));
        assert_eq!(
            schedule.delays(),
            vec![Duration::from_millis(250); 3]
        );
    }

    #[test]
    fn single_attempt_never_sleeps() {
        let schedule = BackoffSchedule::exponential(1, Duration::from_secs(1));
        assert!(schedule.delays().is_empty());
    }
}
