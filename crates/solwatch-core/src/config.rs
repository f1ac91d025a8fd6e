//! Engine configuration.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `SOLWATCH_RPC_URL` / `HELIUS_RPC_URL` | `rpc_url` | `https://api.mainnet-beta.solana.com` |
//! | `SOLWATCH_POLL_INTERVAL_SECS` | `poll_interval` | 10 s |
//! | `SOLWATCH_HISTORY_DEPTH` | `history_depth` | 10 |
//! | `SOLWATCH_REQUEST_TIMEOUT_MS` | `request_timeout` | 3000 ms |
//! | `SOLWATCH_FETCH_TIMEOUT_MS` | `fetch_timeout` | 15000 ms |
//! | `SOLWATCH_MAX_CONCURRENCY` | `max_concurrency` | 8 |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryConfig;
use crate::throttling::ThrottleConfig;
use crate::ConfigError;

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub rpc_url: String,
    /// Interval between scheduled fetch passes.
    pub poll_interval: Duration,
    /// N: both the per-fetch limit and the bound on held history.
    pub history_depth: usize,
    /// Timeout carried by every individual upstream HTTP call.
    pub request_timeout: Duration,
    /// Outer bound on one address fetch, listing plus detail lookups.
    pub fetch_timeout: Duration,
    /// Addresses fetched at once during a fan-out pass.
    pub max_concurrency: usize,
    pub commitment: String,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub throttle: ThrottleConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::from(DEFAULT_RPC_URL),
            poll_interval: Duration::from_secs(10),
            history_depth: 10,
            request_timeout: Duration::from_millis(3_000),
            fetch_timeout: Duration::from_millis(15_000),
            max_concurrency: 8,
            commitment: String::from("confirmed"),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            throttle: ThrottleConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Defaults overlaid with `SOLWATCH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("SOLWATCH_RPC_URL").or_else(|| lookup("HELIUS_RPC_URL")) {
            if !url.trim().is_empty() {
                config.rpc_url = url.trim().to_owned();
            }
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "SOLWATCH_POLL_INTERVAL_SECS", "integer")? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(depth) = parse_var(&lookup, "SOLWATCH_HISTORY_DEPTH", "integer")? {
            config.history_depth = depth;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "SOLWATCH_REQUEST_TIMEOUT_MS", "integer")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "SOLWATCH_FETCH_TIMEOUT_MS", "integer")? {
            config.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(width) = parse_var(&lookup, "SOLWATCH_MAX_CONCURRENCY", "integer")? {
            config.max_concurrency = width;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_history_depth(mut self, history_depth: usize) -> Self {
        self.history_depth = history_depth;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero {
                name: "poll_interval",
            });
        }
        if self.history_depth == 0 {
            return Err(ConfigError::Zero {
                name: "history_depth",
            });
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Zero {
                name: "max_concurrency",
            });
        }
        if self.request_timeout.is_zero() || self.fetch_timeout.is_zero() {
            return Err(ConfigError::Zero { name: "timeout" });
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };

    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            name,
            value: raw,
            expected,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_the_documented_table() {
        let config = MonitorConfig::from_lookup(lookup_from(&[])).expect("defaults are valid");

        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.history_depth, 10);
        assert_eq!(config.request_timeout, Duration::from_millis(3_000));
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.commitment, "confirmed");
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = MonitorConfig::from_lookup(lookup_from(&[
            ("SOLWATCH_RPC_URL", "https://rpc.example.test"),
            ("SOLWATCH_POLL_INTERVAL_SECS", "30"),
            ("SOLWATCH_HISTORY_DEPTH", "25"),
            ("SOLWATCH_MAX_CONCURRENCY", " 4 "),
        ]))
        .expect("valid overrides");

        assert_eq!(config.rpc_url, "https://rpc.example.test");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.history_depth, 25);
        assert_eq!(config.max_concurrency, 4);
    }

    #[test]
    fn helius_variable_is_a_fallback() {
        let config = MonitorConfig::from_lookup(lookup_from(&[(
            "HELIUS_RPC_URL",
            "https://mainnet.helius-rpc.test/?api-key=demo",
        )]))
        .expect("valid");
        assert_eq!(config.rpc_url, "https://mainnet.helius-rpc.test/?api-key=demo");

        let config = MonitorConfig::from_lookup(lookup_from(&[
            ("HELIUS_RPC_URL", "https://helius.test"),
            ("SOLWATCH_RPC_URL", "https://primary.test"),
        ]))
        .expect("valid");
        assert_eq!(config.rpc_url, "https://primary.test");
    }

    #[test]
    fn rejects_unparsable_and_zero_values() {
        let err = MonitorConfig::from_lookup(lookup_from(&[("SOLWATCH_HISTORY_DEPTH", "ten")]))
            .expect_err("must fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue { name: "SOLWATCH_HISTORY_DEPTH", .. }
        ));

        let err = MonitorConfig::from_lookup(lookup_from(&[("SOLWATCH_POLL_INTERVAL_SECS", "0")]))
            .expect_err("must fail");
        assert_eq!(err, ConfigError::Zero { name: "poll_interval" });

        let err = MonitorConfig::default()
            .with_max_concurrency(0)
            .validate()
            .expect_err("must fail");
        assert_eq!(err, ConfigError::Zero { name: "max_concurrency" });
    }
}
