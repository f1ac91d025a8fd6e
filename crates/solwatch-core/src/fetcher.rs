use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::ledger_source::{LedgerSource, RawTransaction, SourceError};
use crate::normalize::normalize;
use crate::retry::RetryConfig;
use crate::{Address, TransactionRecord};

/// A single address could not be fetched this pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetch for {address} failed: {cause}")]
pub struct FetchError {
    pub address: Address,
    #[source]
    pub cause: SourceError,
}

/// Fetches and normalizes the recent transactions of one address.
#[derive(Clone)]
pub struct AddressFetcher {
    source: Arc<dyn LedgerSource>,
    retry: RetryConfig,
    fetch_timeout: Duration,
}

impl AddressFetcher {
    pub fn new(source: Arc<dyn LedgerSource>) -> Self {
        Self::from_config(source, &MonitorConfig::default())
    }

    pub fn from_config(source: Arc<dyn LedgerSource>, config: &MonitorConfig) -> Self {
        Self {
            source,
            retry: config.retry.clone(),
            fetch_timeout: config.fetch_timeout,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Up to `limit` records in provider order (most recent first).
    ///
    /// Descriptors that fail normalization are dropped and logged; they
    /// never fail the call.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the upstream call fails, after retries,
    /// or exceeds the fetch timeout.
    pub async fn fetch_recent(
        &self,
        address: &Address,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, FetchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let raw = self.fetch_raw(address, limit).await.map_err(|cause| {
            warn!(%address, source = self.source.name(), error = %cause, "address fetch failed");
            FetchError {
                address: address.clone(),
                cause,
            }
        })?;

        let fetched = raw.len();
        let mut records: Vec<TransactionRecord> = raw
            .iter()
            .filter_map(|descriptor| match normalize(descriptor) {
                Ok(record) => Some(record),
                Err(error) => {
                    warn!(%address, error = %error, "dropping transaction that failed normalization");
                    None
                }
            })
            .collect();
        records.truncate(limit);

        debug!(%address, fetched, kept = records.len(), "fetched recent transactions");
        Ok(records)
    }

    async fn fetch_raw(&self, address: &Address, limit: usize) -> Result<Vec<RawTransaction>, SourceError> {
        let mut attempt = 0;
        loop {
            match self.attempt(address, limit).await {
                Ok(raw) => return Ok(raw),
                Err(error) if self.retry.should_retry(&error, attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    debug!(
                        %address,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying address fetch"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn attempt(&self, address: &Address, limit: usize) -> Result<Vec<RawTransaction>, SourceError> {
        tokio::time::timeout(self.fetch_timeout, self.source.recent_transactions(address, limit))
            .await
            .unwrap_or_else(|_| {
                Err(SourceError::timeout(format!(
                    "{} did not answer within {}ms",
                    self.source.name(),
                    self.fetch_timeout.as_millis()
                )))
            })
    }
}

impl std::fmt::Debug for AddressFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressFetcher")
            .field("source", &self.source.name())
            .field("retry", &self.retry)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{raw_descriptor, FixtureSource};
    use crate::SourceErrorKind;
    use serde_json::json;

    fn address() -> Address {
        Address::parse("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA").expect("valid")
    }

    fn fetcher(source: Arc<FixtureSource>) -> AddressFetcher {
        AddressFetcher::new(source).with_retry(RetryConfig::fixed(Duration::from_millis(1), 2))
    }

    #[tokio::test]
    async fn keeps_provider_order_and_drops_bad_descriptors() {
        let source = Arc::new(FixtureSource::default());
        let address = address();
        source.push_response(
            &address,
            vec![
                raw_descriptor("newest", Some(300), false),
                RawTransaction::new(json!({ "blockTime": 200 })),
                raw_descriptor("oldest", Some(100), true),
            ],
        );

        let records = fetcher(source).fetch_recent(&address, 10).await.expect("fetch ok");

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "oldest"]);
        assert!(!records[1].outcome.is_success());
    }

    #[tokio::test]
    async fn retries_retryable_failures() {
        let source = Arc::new(FixtureSource::default());
        let address = address();
        source.push_failure(&address, SourceError::unavailable("502"));
        source.push_response(&address, vec![raw_descriptor("a", None, false)]);

        let records = fetcher(source.clone())
            .fetch_recent(&address, 10)
            .await
            .expect("second attempt succeeds");

        assert_eq!(records.len(), 1);
        assert_eq!(source.calls(&address), 2);
    }

    #[tokio::test]
    async fn non_retryable_failure_surfaces_immediately() {
        let source = Arc::new(FixtureSource::default());
        let address = address();
        source.push_failure(&address, SourceError::rejected("bad param"));

        let error = fetcher(source.clone())
            .fetch_recent(&address, 10)
            .await
            .expect_err("rejected is final");

        assert_eq!(error.address, address);
        assert_eq!(error.cause.kind(), SourceErrorKind::Rejected);
        assert_eq!(source.calls(&address), 1);
    }

    #[tokio::test]
    async fn slow_source_times_out() {
        let source = Arc::new(FixtureSource::default().with_latency(Duration::from_millis(200)));
        let address = address();

        let error = AddressFetcher::new(source)
            .with_retry(RetryConfig::no_retry())
            .with_fetch_timeout(Duration::from_millis(10))
            .fetch_recent(&address, 10)
            .await
            .expect_err("times out");

        assert_eq!(error.cause.kind(), SourceErrorKind::Timeout);
    }

    #[tokio::test]
    async fn caps_output_at_limit() {
        let source = Arc::new(FixtureSource::synthetic());
        let records = fetcher(source)
            .fetch_recent(&address(), 4)
            .await
            .expect("synthetic ok");
        assert_eq!(records.len(), 4);
    }
}
