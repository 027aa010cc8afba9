//! Exponential backoff with jitter.
//!
//! # Interval Sequence
//! ```text
//! base(1) = initial_interval
//! base(n) = min(max_interval, base(n-1) * multiplier)
//! wait(n) = min(max_interval, uniform[base(n) * (1 - jitter), base(n) * (1 + jitter)])
//! ```
//!
//! The un-jittered base carries forward, so jitter never compounds across
//! attempts.

use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use crate::config::schema::RetryConfig;

/// Errors raised when a retry policy is malformed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("initial_interval must be greater than zero")]
    ZeroInterval,

    #[error("max_interval ({max:?}) must not be below initial_interval ({initial:?})")]
    MaxBelowInitial { initial: Duration, max: Duration },

    #[error("multiplier must be a finite value greater than 1, got {0}")]
    Multiplier(f64),

    #[error("jitter_factor must be within [0, 1], got {0}")]
    JitterFactor(f64),
}

/// Immutable retry configuration shared by every retry invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
    jitter_factor: f64,
}

impl RetryPolicy {
    /// Build a validated policy.
    pub fn new(
        max_attempts: u32,
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
        jitter_factor: f64,
    ) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if initial_interval.is_zero() {
            return Err(PolicyError::ZeroInterval);
        }
        if max_interval < initial_interval {
            return Err(PolicyError::MaxBelowInitial {
                initial: initial_interval,
                max: max_interval,
            });
        }
        if !multiplier.is_finite() || multiplier <= 1.0 {
            return Err(PolicyError::Multiplier(multiplier));
        }
        if !(0.0..=1.0).contains(&jitter_factor) {
            return Err(PolicyError::JitterFactor(jitter_factor));
        }

        Ok(Self {
            max_attempts,
            initial_interval,
            max_interval,
            multiplier,
            jitter_factor,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_interval(&self) -> Duration {
        self.initial_interval
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    /// Start a fresh interval sequence for one retry invocation.
    pub fn backoff(&self) -> Backoff<'_> {
        Backoff {
            policy: self,
            base: None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(1),
            multiplier: 2.0,
            jitter_factor: 0.5,
        }
    }
}

impl TryFrom<&RetryConfig> for RetryPolicy {
    type Error = PolicyError;

    fn try_from(config: &RetryConfig) -> Result<Self, Self::Error> {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_interval_ms),
            Duration::from_millis(config.max_interval_ms),
            config.multiplier,
            config.jitter_factor,
        )
    }
}

/// Per-invocation interval generator.
#[derive(Debug)]
pub struct Backoff<'a> {
    policy: &'a RetryPolicy,
    base: Option<Duration>,
}

impl Backoff<'_> {
    /// The un-jittered interval the next call to `next_delay` will perturb.
    pub fn peek_base(&self) -> Duration {
        match self.base {
            None => self.policy.initial_interval,
            Some(prev) => scale(prev, self.policy.multiplier).min(self.policy.max_interval),
        }
    }

    /// Advance the sequence and return the jittered wait.
    pub fn next_delay<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Duration {
        let base = self.peek_base();
        self.base = Some(base);
        apply_jitter(base, self.policy.jitter_factor, self.policy.max_interval, rng)
    }
}

fn scale(interval: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(interval.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// Draw uniformly from `[base*(1-j), base*(1+j)]` and clamp to `ceiling`.
pub fn apply_jitter<R: Rng + ?Sized>(
    base: Duration,
    jitter_factor: f64,
    ceiling: Duration,
    rng: &mut R,
) -> Duration {
    if jitter_factor == 0.0 {
        return base.min(ceiling);
    }

    let secs = base.as_secs_f64();
    let low = secs * (1.0 - jitter_factor);
    let high = secs * (1.0 + jitter_factor);
    let drawn = rng.gen_range(low..=high).max(0.0);

    Duration::try_from_secs_f64(drawn)
        .unwrap_or(ceiling)
        .min(ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn policy(jitter: f64) -> RetryPolicy {
        RetryPolicy::new(
            6,
            Duration::from_millis(100),
            Duration::from_secs(1),
            2.0,
            jitter,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_policies() {
        let ms = Duration::from_millis;
        assert_eq!(
            RetryPolicy::new(0, ms(100), ms(200), 2.0, 0.1),
            Err(PolicyError::ZeroAttempts)
        );
        assert_eq!(
            RetryPolicy::new(3, ms(0), ms(200), 2.0, 0.1),
            Err(PolicyError::ZeroInterval)
        );
        assert!(matches!(
            RetryPolicy::new(3, ms(300), ms(200), 2.0, 0.1),
            Err(PolicyError::MaxBelowInitial { .. })
        ));
        assert_eq!(
            RetryPolicy::new(3, ms(100), ms(200), 1.0, 0.1),
            Err(PolicyError::Multiplier(1.0))
        );
        assert!(RetryPolicy::new(3, ms(100), ms(200), f64::NAN, 0.1).is_err());
        assert_eq!(
            RetryPolicy::new(3, ms(100), ms(200), 2.0, 1.5),
            Err(PolicyError::JitterFactor(1.5))
        );
        assert!(RetryPolicy::new(3, ms(100), ms(200), 2.0, -0.1).is_err());
        assert!(RetryPolicy::new(1, ms(100), ms(100), 1.01, 1.0).is_ok());
    }

    #[test]
    fn test_unjittered_sequence_doubles_then_caps() {
        let policy = policy(0.0);
        let mut backoff = policy.backoff();
        let mut rng = StdRng::seed_from_u64(7);

        let delays: Vec<u128> = (0..6)
            .map(|_| backoff.next_delay(&mut rng).as_millis())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn test_jittered_delays_stay_in_band() {
        let policy = policy(0.5);
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            let mut backoff = policy.backoff();
            for _ in 0..6 {
                let base = backoff.peek_base();
                let delay = backoff.next_delay(&mut rng);
                let low = base.mul_f64(0.5);
                let high = base.mul_f64(1.5).min(policy.max_interval());
                assert!(delay <= policy.max_interval());
                assert!(delay >= low, "{delay:?} below {low:?}");
                assert!(delay <= high, "{delay:?} above {high:?}");
            }
        }
    }

    #[test]
    fn test_jitter_does_not_compound() {
        let policy = policy(1.0);
        let mut rng = StdRng::seed_from_u64(1);
        let mut backoff = policy.backoff();

        backoff.next_delay(&mut rng);
        assert_eq!(backoff.peek_base(), Duration::from_millis(200));
        backoff.next_delay(&mut rng);
        assert_eq!(backoff.peek_base(), Duration::from_millis(400));
    }

    #[test]
    fn test_from_config() {
        let config = RetryConfig::default();
        let policy = RetryPolicy::try_from(&config).unwrap();
        assert_eq!(policy.max_attempts(), config.max_attempts);
        assert_eq!(policy.initial_interval(), Duration::from_millis(100));

        let bad = RetryConfig {
            multiplier: 0.5,
            ..RetryConfig::default()
        };
        assert!(RetryPolicy::try_from(&bad).is_err());
    }
}
