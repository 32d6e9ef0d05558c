//! Retry schedule for the transcription endpoint.
//!
//! Delay before attempt `n` (1-based, `n >= 2`):
//!
//! ```text
//! base(n)   = min(base_delay * 2^(n-2), max_delay)
//! actual(n) = base(n) * (1 + U(-jitter, +jitter))
//! ```
//!
//! With the defaults (1 s base, 60 s cap, ±25 %, 6 attempts) the un-jittered
//! waits are 1 s → 2 s → 4 s → 8 s → 16 s. Because jitter is at most ±25 %
//! and each step doubles, consecutive jittered delays never decrease until
//! the cap is reached.
//!
//! The random source is always a parameter so tests can pin the sequence.

use rand::Rng;
use std::time::Duration;

/// Parameters of the exponential-backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Default: 6.
    pub max_attempts: u32,
    /// Delay before the second attempt. Default: 1 s.
    pub base_delay: Duration,
    /// Upper bound on the un-jittered delay. Default: 60 s.
    pub max_delay: Duration,
    /// Symmetric jitter fraction in `[0, 1)`. Default: 0.25.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(60_000),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay before `attempt` (1-based). Zero for the first attempt.
    pub fn base_delay_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Jittered delay before `attempt`, drawing from `rng`.
    pub fn delay_before<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay_before(attempt);
        if base.is_zero() || self.jitter <= 0.0 {
            return base;
        }
        let spread = self.jitter.min(0.999);
        let factor = 1.0 + rng.gen_range(-spread..=spread);
        base.mul_f64(factor)
    }

    /// Whether another attempt is allowed after `attempt` failed.
    pub fn allows_another(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Per-call bookkeeping; created at the start of one `transcribe` and dropped at its end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// 1-based number of the attempt in progress (0 before the first).
    pub attempt: u32,
    /// Jittered delay slept before the current attempt, in milliseconds.
    pub last_delay_ms: u64,
}

impl RetryState {
    /// Advance to the next attempt, returning how long to wait first.
    pub fn advance<R: Rng + ?Sized>(&mut self, policy: &RetryPolicy, rng: &mut R) -> Duration {
        self.attempt += 1;
        let delay = policy.delay_before(self.attempt, rng);
        self.last_delay_ms = delay.as_millis() as u64;
        delay
    }
}

/// HTTP statuses worth retrying: rate limiting and transient gateway/server errors.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn base_schedule_doubles_from_one_second() {
        let p = RetryPolicy::default();
        let ms: Vec<u128> = (1..=6).map(|n| p.base_delay_before(n).as_millis()).collect();
        assert_eq!(ms, vec![0, 1_000, 2_000, 4_000, 8_000, 16_000]);
    }

    #[test]
    fn base_schedule_caps_at_max_delay() {
        let p = RetryPolicy::default();
        assert_eq!(p.base_delay_before(8), Duration::from_millis(60_000));
        assert_eq!(p.base_delay_before(40), Duration::from_millis(60_000));
    }

    #[test]
    fn jitter_stays_within_quarter() {
        let p = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(42);
        for attempt in 2..=7 {
            let base = p.base_delay_before(attempt).as_secs_f64();
            for _ in 0..200 {
                let d = p.delay_before(attempt, &mut rng).as_secs_f64();
                assert!(d >= base * 0.75 - 1e-9 && d <= base * 1.25 + 1e-9, "{d} vs {base}");
            }
        }
    }

    #[test]
    fn jittered_delays_are_non_decreasing_below_cap() {
        let p = RetryPolicy::default();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut state = RetryState::default();
            let mut prev = Duration::ZERO;
            for _ in 0..6 {
                let d = state.advance(&p, &mut rng);
                assert!(d >= prev, "seed {seed}: {d:?} < {prev:?}");
                prev = d;
            }
        }
    }

    #[test]
    fn same_seed_same_delays() {
        let p = RetryPolicy::default();
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (2..=6).map(|n| p.delay_before(n, &mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn zero_jitter_is_exact() {
        let p = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(p.delay_before(3, &mut rng), Duration::from_millis(2_000));
    }

    #[test]
    fn retry_state_tracks_attempt_and_delay() {
        let p = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let mut s = RetryState::default();
        assert_eq!(s.advance(&p, &mut rng), Duration::ZERO);
        assert_eq!(s.attempt, 1);
        s.advance(&p, &mut rng);
        s.advance(&p, &mut rng);
        assert_eq!(s.attempt, 3);
        assert_eq!(s.last_delay_ms, 2_000);
    }

    #[test]
    fn retryable_statuses() {
        for s in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(s), "{s}");
        }
        for s in [200, 400, 401, 403, 404, 422, 501, 505] {
            assert!(!is_retryable_status(s), "{s}");
        }
    }

    #[test]
    fn attempt_budget() {
        let p = RetryPolicy::default();
        assert!(p.allows_another(5));
        assert!(!p.allows_another(6));
    }
}
