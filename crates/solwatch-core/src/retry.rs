//! Retry logic with exponential backoff and jitter.

use std::time::Duration;

use crate::ledger_source::{SourceError, SourceErrorKind};

/// Backoff strategy between retries of one upstream fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed {
        delay: Duration,
    },
    /// `base * factor^attempt`, capped at `max`, optionally +/- 50% jitter.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(250),
            factor: 2.0,
            max: Duration::from_secs(2),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt as i32);
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(seconds);

                if !jitter {
                    return delay;
                }

                let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                let offset = fastrand::u64(0..=(jitter_ms * 2));
                let total_ms = delay.as_millis() as i64 + (offset as i64 - jitter_ms as i64);
                Duration::from_millis(total_ms.max(0) as u64)
            }
        }
    }
}

/// Retry policy for per-address fetches.
///
/// Retries are deliberately few: the session re-polls every interval anyway,
/// so a fetch that keeps failing simply waits for the next tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub enabled: bool,
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retry_on_timeout: bool,
    pub retry_on_rate_limit: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            backoff: Backoff::default(),
            retry_on_timeout: true,
            retry_on_rate_limit: true,
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether `error`, seen on attempt `attempt` (0-based), earns another try.
    pub fn should_retry(&self, error: &SourceError, attempt: u32) -> bool {
        if !self.enabled || attempt >= self.max_retries || !error.retryable() {
            return false;
        }

        match error.kind() {
            SourceErrorKind::Timeout => self.retry_on_timeout,
            SourceErrorKind::RateLimited => self.retry_on_rate_limit,
            _ => true,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_half_of_the_delay() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..10 {
            for attempt in 0..5 {
                let expected = (100.0 * 2_f64.powi(attempt as i32)).min(1000.0);
                let delay_ms = backoff.delay(attempt).as_millis() as f64;
                assert!(delay_ms >= expected * 0.49, "attempt={attempt}, delay_ms={delay_ms}");
                assert!(delay_ms <= expected * 1.51, "attempt={attempt}, delay_ms={delay_ms}");
            }
        }
    }

    #[test]
    fn retries_only_retryable_errors_within_budget() {
        let config = RetryConfig::fixed(Duration::from_millis(10), 2);

        let unavailable = SourceError::unavailable("502");
        assert!(config.should_retry(&unavailable, 0));
        assert!(config.should_retry(&unavailable, 1));
        assert!(!config.should_retry(&unavailable, 2));

        assert!(!config.should_retry(&SourceError::rejected("400"), 0));
        assert!(!config.should_retry(&SourceError::malformed("garbage"), 0));
    }

    #[test]
    fn timeout_and_rate_limit_retries_can_be_disabled() {
        let config = RetryConfig {
            retry_on_timeout: false,
            retry_on_rate_limit: false,
            ..RetryConfig::exponential(3)
        };

        assert!(!config.should_retry(&SourceError::timeout("slow"), 0));
        assert!(!config.should_retry(&SourceError::rate_limited("429"), 0));
        assert!(config.should_retry(&SourceError::unavailable("503"), 0));
    }

    #[test]
    fn no_retry_never_retries() {
        let config = RetryConfig::no_retry();
        assert!(!config.enabled);
        assert!(!config.should_retry(&SourceError::unavailable("down"), 0));
    }
}
