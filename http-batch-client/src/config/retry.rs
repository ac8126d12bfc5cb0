//! Follow-up round policy.
//!
//! A batch is executed in rounds. After each round, the requests whose
//! unsuccessful-response handler asked for a retry are sent again as a new,
//! smaller batch. [`RetryPolicy`] caps how many such follow-up rounds may
//! happen and how long to wait before each.
//!
//! ```
//! use http_batch_client::RetryPolicy;
//! use std::time::Duration;
//!
//! // Up to 5 follow-up rounds, sent immediately
//! let policy = RetryPolicy::default();
//!
//! // Up to 3 follow-up rounds, 100ms, 160ms, 256ms apart (before jitter)
//! let policy = RetryPolicy::new()
//!     .max_retry_rounds(3)
//!     .base_delay(Duration::from_millis(100))
//!     .max_delay(Duration::from_secs(5));
//! assert_eq!(policy.backoff().count(), 3);
//! ```

use std::time::Duration;

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    /// Follow-up rounds allowed after the initial one.
    pub const MAX_RETRY_ROUNDS: u32 = 5;

    /// No pause: a retried request is usually waiting on fresh credentials,
    /// which the handler has already installed.
    pub const BASE_DELAY: Duration = Duration::ZERO;

    pub const MULTIPLIER: f64 = 1.6;

    /// +/- 20%.
    pub const JITTER: f64 = 0.2;

    pub const MAX_DELAY: Duration = Duration::from_secs(30);
}

/// Cap and pacing of follow-up rounds.
///
/// | field | default |
/// |---|---|
/// | `max_retry_rounds` | 5 |
/// | `base_delay` | zero |
/// | `multiplier` | 1.6 |
/// | `jitter` | 0.2 |
/// | `max_delay` | 30s |
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Follow-up rounds allowed, not counting the initial round.
    pub max_retry_rounds: u32,
    /// Pause before the first follow-up round.
    pub base_delay: Duration,
    /// Growth of the pause per follow-up round, at least 1.0.
    pub multiplier: f64,
    /// Relative randomization of each pause, within `0.0..=1.0`.
    pub jitter: f64,
    /// Upper bound on any single pause.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_rounds: defaults::MAX_RETRY_ROUNDS,
            base_delay: defaults::BASE_DELAY,
            multiplier: defaults::MULTIPLIER,
            jitter: defaults::JITTER,
            max_delay: defaults::MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// No follow-up rounds at all.
    ///
    /// Any handler asking for a retry aborts the batch with
    /// [`BatchError::RetryLimitExceeded`](crate::BatchError::RetryLimitExceeded).
    pub fn no_retry() -> Self {
        Self::default().max_retry_rounds(0)
    }

    /// `rounds` follow-up rounds, each sent as soon as the previous one is
    /// dispatched.
    pub fn immediate(rounds: u32) -> Self {
        Self::default()
            .max_retry_rounds(rounds)
            .base_delay(Duration::ZERO)
    }

    pub fn max_retry_rounds(mut self, rounds: u32) -> Self {
        self.max_retry_rounds = rounds;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// # Panics
    ///
    /// If `multiplier` is below 1.0.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        assert!(multiplier >= 1.0, "multiplier must be >= 1.0");
        self.multiplier = multiplier;
        self
    }

    /// # Panics
    ///
    /// If `jitter` is outside `0.0..=1.0`.
    pub fn jitter(mut self, jitter: f64) -> Self {
        assert!((0.0..=1.0).contains(&jitter), "jitter must be within 0.0..=1.0");
        self.jitter = jitter;
        self
    }

    /// Check the invariants the setters enforce, for policies built field by
    /// field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.multiplier < 1.0 {
            Err("multiplier must be >= 1.0")
        } else if !(0.0..=1.0).contains(&self.jitter) {
            Err("jitter must be within 0.0..=1.0")
        } else if self.base_delay > self.max_delay {
            Err("base_delay must not exceed max_delay")
        } else {
            Ok(())
        }
    }

    /// The pauses of one execution, one per permitted follow-up round.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            policy: self.clone(),
            granted: 0,
        }
    }
}

/// Iterator over the pause before each permitted follow-up round.
///
/// Yields exactly `max_retry_rounds` items. The `n`th pause (0-based) is
/// `base_delay * multiplier^n`, capped at `max_delay`, then scaled by a random
/// factor in `1 - jitter ..= 1 + jitter` and capped again.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    policy: RetryPolicy,
    granted: u32,
}

impl ExponentialBackoff {
    /// Follow-up rounds handed out so far.
    pub fn rounds(&self) -> u32 {
        self.granted
    }

    /// Follow-up rounds still available.
    pub fn remaining(&self) -> u32 {
        self.policy.max_retry_rounds.saturating_sub(self.granted)
    }

    pub fn can_retry(&self) -> bool {
        self.remaining() > 0
    }

    fn pause(&self, round: u32) -> Duration {
        let cap = self.policy.max_delay.as_secs_f64();
        let exponent = i32::try_from(round).unwrap_or(i32::MAX);
        let nominal = (self.policy.base_delay.as_secs_f64() * self.policy.multiplier.powi(exponent))
            .min(cap);
        let secs = if nominal == 0.0 || self.policy.jitter == 0.0 {
            nominal
        } else {
            let spread = rand::random_range(-self.policy.jitter..=self.policy.jitter);
            (nominal * (1.0 + spread)).clamp(0.0, cap)
        };
        // f64 rounding can land just past Duration::MAX
        Duration::try_from_secs_f64(secs).unwrap_or(self.policy.max_delay)
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if !self.can_retry() {
            return None;
        }
        let pause = self.pause(self.granted);
        self.granted += 1;
        Some(pause)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining() as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ExponentialBackoff {}
