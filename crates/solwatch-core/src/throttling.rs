use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::ledger_source::SourceError;

/// Client-side request budget for one upstream endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleConfig {
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_waits: u32,
}

impl Default for ThrottleConfig {
    /// Public mainnet-beta allows 100 requests per 10 s per IP.
    fn default() -> Self {
        Self {
            quota_window: Duration::from_secs(10),
            quota_limit: 100,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_waits: 6,
        }
    }
}

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared limiter that makes callers wait their turn instead of bursting.
///
/// Listing plus detail lookups for a whole fan-out pass can easily exceed a
/// provider quota; waiting here turns that into latency rather than 429s.
#[derive(Clone)]
pub struct RequestThrottle {
    limiter: Arc<DirectRateLimiter>,
    waiting: Arc<AtomicUsize>,
    config: ThrottleConfig,
}

impl RequestThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        let quota = quota_from_window(config.quota_window, config.quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            waiting: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    /// Non-blocking check; consumes one unit of budget on success.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Waits for budget with capped exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns a rate-limited [`SourceError`] once `max_waits` is exhausted.
    pub async fn acquire(&self) -> Result<(), SourceError> {
        if self.try_acquire() {
            return Ok(());
        }

        self.waiting.fetch_add(1, Ordering::SeqCst);
        let result = self.wait_for_budget().await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn wait_for_budget(&self) -> Result<(), SourceError> {
        let mut waits = 0;
        while let Some(delay) = self.retry_delay(waits) {
            debug!(delay_ms = delay.as_millis() as u64, waits, "request budget exhausted, waiting");
            tokio::time::sleep(delay).await;
            if self.try_acquire() {
                return Ok(());
            }
            waits += 1;
        }

        Err(SourceError::rate_limited(format!(
            "local request budget of {} per {}s exhausted",
            self.config.quota_limit,
            self.config.quota_window.as_secs_f64()
        )))
    }

    /// Callers currently parked in [`acquire`](Self::acquire).
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn retry_delay(&self, waits: u32) -> Option<Duration> {
        if waits >= self.config.max_waits {
            return None;
        }

        let scale = self.config.multiplier.powf(f64::from(waits));
        let seconds = self.config.initial_delay.as_secs_f64() * scale;
        let capped = seconds.min(self.config.max_delay.as_secs_f64());
        Some(Duration::from_secs_f64(capped))
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("config", &self.config)
            .field("waiting", &self.waiting())
            .finish()
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = NonZeroU32::new(quota_limit.max(1)).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell =
        (quota_window.as_secs_f64() / f64::from(safe_limit.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(safe_limit))
        .allow_burst(safe_limit)
}
