//! Exponential backoff policy for the refresh loop.
//!
//! A backoff is computed as a range from which a random value is
//! selected:
//!
//! ```text
//! min = base * 2^errors / min_backoff_factor
//! max = min(max_backoff, base * 2^errors)
//! ```
//!
//! With `min_backoff_factor = 2` every range is
//! `[base * 2^(n-1), min(max_backoff, base * 2^n)]`. Each success
//! shrinks the error count by `recovery_interval` rather than resetting
//! it, so recovery from a transient outage is gradual.

use std::time::Duration;

use rand::Rng;

/// Error count reduction applied per successful refresh.
const RECOVERY_INTERVAL: u32 = 2;

/// Exponent cap; beyond this the range ceiling has long since saturated
/// at `max_backoff` for any sane configuration.
const MAX_EXPONENT: u32 = 30;

#[derive(Debug, Clone)]
pub struct ExpBackoffPolicy {
    min_backoff_factor: f64,
    base: Duration,
    max_backoff: Duration,
    recovery_interval: u32,
    recovery_reset: bool,
}

impl ExpBackoffPolicy {
    /// Policy used by the refresh loop. Only the ceiling is
    /// configurable; the curve itself needs no tuning knobs.
    pub fn new(max_backoff: Duration) -> Self {
        Self {
            min_backoff_factor: 2.0,
            base: Duration::from_secs(30),
            max_backoff,
            recovery_interval: RECOVERY_INTERVAL,
            recovery_reset: false,
        }
    }

    /// The `[min, max]` delay range for a given error count. Pure:
    /// this is the table-testable contract of the policy.
    pub fn backoff_range(&self, error_count: u32) -> (Duration, Duration) {
        if error_count == 0 {
            return (Duration::ZERO, Duration::ZERO);
        }
        let pow = 2f64.powi(error_count.min(MAX_EXPONENT) as i32);
        let raw = self.base.as_secs_f64() * pow;
        let max = raw.min(self.max_backoff.as_secs_f64());
        let min = (raw / self.min_backoff_factor).min(max);
        (Duration::from_secs_f64(min), Duration::from_secs_f64(max))
    }

    /// A delay sampled uniformly from [`Self::backoff_range`].
    pub fn backoff_duration(&self, error_count: u32) -> Duration {
        let (min, max) = self.backoff_range(error_count);
        if min >= max {
            return max;
        }
        let mut rng = rand::rng();
        let secs = rng.random_range(min.as_secs_f64()..=max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Register a failed refresh.
    pub fn inc_error(&self, error_count: u32) -> u32 {
        error_count.saturating_add(1)
    }

    /// Register a successful refresh. Decrements by the recovery
    /// interval (floor zero) so the delay shrinks gradually.
    pub fn dec_error(&self, error_count: u32) -> u32 {
        if self.recovery_reset {
            return 0;
        }
        error_count.saturating_sub(self.recovery_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn policy() -> ExpBackoffPolicy {
        ExpBackoffPolicy::new(Duration::from_secs(120))
    }

    #[test]
    fn zero_errors_means_zero_delay() {
        assert_eq!(
            policy().backoff_range(0),
            (Duration::ZERO, Duration::ZERO)
        );
        assert_eq!(policy().backoff_duration(0), Duration::ZERO);
    }

    #[test]
    fn range_table() {
        let policy = policy();
        // (errors, min secs, max secs) with base 30s, ceiling 120s.
        let table = [
            (1, 30.0, 60.0),
            (2, 60.0, 120.0),
            (3, 120.0, 120.0),
            (10, 120.0, 120.0),
        ];
        for (errors, min, max) in table {
            let (lo, hi) = policy.backoff_range(errors);
            assert_eq!(lo, Duration::from_secs_f64(min), "min for {errors} errors");
            assert_eq!(hi, Duration::from_secs_f64(max), "max for {errors} errors");
        }
    }

    #[test]
    fn range_is_non_decreasing_up_to_ceiling() {
        let policy = policy();
        let mut previous = Duration::ZERO;
        for errors in 0..16 {
            let (lo, hi) = policy.backoff_range(errors);
            assert!(lo >= previous, "min regressed at {errors} errors");
            assert!(hi <= Duration::from_secs(120));
            previous = lo;
        }
    }

    #[test]
    fn sampled_duration_stays_in_range() {
        let policy = policy();
        for _ in 0..100 {
            let d = policy.backoff_duration(1);
            assert!(
                (Duration::from_secs(30)..=Duration::from_secs(60)).contains(&d),
                "sampled {d:?} outside [30s, 60s]"
            );
        }
    }

    #[test]
    fn hysteresis_on_recovery() {
        let policy = policy();
        let mut errors = 0;
        for _ in 0..5 {
            errors = policy.inc_error(errors);
        }
        assert_eq!(errors, 5);

        // One success shrinks by the recovery interval, not to zero.
        errors = policy.dec_error(errors);
        assert_eq!(errors, 3);

        // And the delay range after the success is strictly below the
        // range immediately before it... until the ceiling flattens it.
        let before = policy.backoff_range(5);
        let after = policy.backoff_range(3);
        assert!(after.0 <= before.0 && after.1 <= before.1);

        let low_before = policy.backoff_range(2);
        let low_after = policy.backoff_range(policy.dec_error(2));
        assert!(low_after.1 < low_before.1);
    }

    #[test]
    fn dec_error_floors_at_zero() {
        let policy = policy();
        assert_eq!(policy.dec_error(1), 0);
        assert_eq!(policy.dec_error(0), 0);
    }

    #[test]
    fn large_error_counts_do_not_overflow() {
        let policy = policy();
        let (lo, hi) = policy.backoff_range(u32::MAX);
        assert_eq!(lo, Duration::from_secs(120));
        assert_eq!(hi, Duration::from_secs(120));
    }
}
