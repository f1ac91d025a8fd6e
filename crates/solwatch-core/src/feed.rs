//! One-shot request surface: a list of addresses in, their recent
//! transactions out.
//!
//! ```json
//! { "addresses": ["So111...112"], "depth": 10 }
//! ```
//!
//! answers
//!
//! ```json
//! { "wallets": [ { "address": "So111...112", "transactions": [ ... ] } ] }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::MonitorConfig;
use crate::fanout::FanOut;
use crate::fetcher::AddressFetcher;
use crate::ledger_source::LedgerSource;
use crate::{Address, CoreError, TransactionRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRequest {
    pub addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
}

impl MonitorRequest {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransactions {
    pub address: Address,
    pub transactions: Vec<TransactionRecord>,
}

/// Why a wallet came back empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletError {
    pub address: Address,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorResponse {
    pub wallets: Vec<WalletTransactions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<WalletError>,
}

impl MonitorResponse {
    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Serves [`MonitorRequest`]s with a single fan-out pass each.
#[derive(Debug, Clone)]
pub struct MonitorFeed {
    fan_out: FanOut,
    default_depth: usize,
}

impl MonitorFeed {
    pub fn new(source: Arc<dyn LedgerSource>, config: &MonitorConfig) -> Self {
        let fetcher = AddressFetcher::from_config(source, config);
        Self {
            fan_out: FanOut::new(fetcher, config.max_concurrency),
            default_depth: config.history_depth,
        }
    }

    /// Wallets are returned in request order with duplicates collapsed; a
    /// wallet whose fetch failed has no transactions and an entry in
    /// `errors`.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidAddress`] for the first malformed address, or
    /// [`CoreError::Precondition`] for an empty list or zero depth.
    pub async fn handle(&self, request: &MonitorRequest) -> Result<MonitorResponse, CoreError> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::with_capacity(request.addresses.len());
        for raw in &request.addresses {
            let address = Address::parse(raw)?;
            if seen.insert(address.clone()) {
                ordered.push(address);
            }
        }

        let depth = request.depth.unwrap_or(self.default_depth);
        let mut results = self.fan_out.fetch_all(&ordered, depth).await?;

        let mut response = MonitorResponse {
            wallets: Vec::with_capacity(ordered.len()),
            errors: Vec::new(),
        };
        for address in ordered {
            let transactions = match results.remove(&address) {
                Some(Ok(records)) => records,
                Some(Err(error)) => {
                    response.errors.push(WalletError {
                        address: address.clone(),
                        code: error.cause.code().to_owned(),
                        message: error.cause.message().to_owned(),
                    });
                    Vec::new()
                }
                None => Vec::new(),
            };
            response.wallets.push(WalletTransactions {
                address,
                transactions,
            });
        }

        info!(
            wallets = response.wallets.len(),
            failed = response.errors.len(),
            "served monitor request"
        );
        Ok(response)
    }

    /// JSON in, JSON out.
    ///
    /// # Errors
    ///
    /// [`CoreError::Serialization`] for an unreadable body, otherwise as
    /// [`handle`](Self::handle).
    pub async fn handle_json(&self, body: &str) -> Result<String, CoreError> {
        let request: MonitorRequest = serde_json::from_str(body)?;
        let response = self.handle(&request).await?;
        Ok(serde_json::to_string(&response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{raw_descriptor, FixtureSource};
    use crate::retry::RetryConfig;
    use crate::{InvalidAddress, PreconditionError, SourceError};

    const A: &str = "So11111111111111111111111111111111111111112";
    const B: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

    fn feed(source: Arc<FixtureSource>) -> MonitorFeed {
        let config = MonitorConfig::default().with_retry(RetryConfig::no_retry());
        MonitorFeed::new(source, &config)
    }

    fn addr(raw: &str) -> Address {
        Address::parse(raw).expect("valid")
    }

    #[tokio::test]
    async fn answers_in_request_order_with_duplicates_collapsed() {
        let source = Arc::new(FixtureSource::default());
        source.push_response(&addr(B), vec![raw_descriptor("b1", Some(10), false)]);

        let response = feed(source)
            .handle(&MonitorRequest::new([B, A, B]))
            .await
            .expect("served");

        let order: Vec<&str> = response.wallets.iter().map(|w| w.address.as_str()).collect();
        assert_eq!(order, vec![B, A]);
        assert_eq!(response.wallets[0].transactions.len(), 1);
        assert!(response.wallets[1].transactions.is_empty());
        assert!(!response.has_failures());
    }

    #[tokio::test]
    async fn failed_wallet_comes_back_empty() {
        let source = Arc::new(FixtureSource::default());
        source.push_failure(&addr(A), SourceError::unavailable("503"));
        source.push_response(&addr(B), vec![raw_descriptor("b1", None, false)]);

        let response = feed(source)
            .handle(&MonitorRequest::new([A, B]))
            .await
            .expect("served");

        assert!(response.wallets[0].transactions.is_empty());
        assert_eq!(response.wallets[1].transactions.len(), 1);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].code, "source.unavailable");
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let feed = feed(Arc::new(FixtureSource::default()));

        let error = feed
            .handle(&MonitorRequest::new(Vec::<String>::new()))
            .await
            .expect_err("empty");
        assert!(matches!(error, CoreError::Precondition(PreconditionError::EmptyAddressSet)));

        let error = feed
            .handle(&MonitorRequest::new([A, "0xdeadbeef"]))
            .await
            .expect_err("invalid");
        assert!(matches!(error, CoreError::InvalidAddress(InvalidAddress::Length { .. })));

        let error = feed
            .handle(&MonitorRequest::new([A]).with_depth(0))
            .await
            .expect_err("zero depth");
        assert!(matches!(error, CoreError::Precondition(PreconditionError::ZeroLimit)));
    }

    #[tokio::test]
    async fn json_round_trip_uses_the_wallets_shape() {
        let source = Arc::new(FixtureSource::default());
        source.push_response(&addr(A), vec![raw_descriptor("a1", Some(1_704_067_200), true)]);

        let body = feed(source)
            .handle_json(&format!(r#"{{"addresses":["{A}"],"depth":5}}"#))
            .await
            .expect("served");
        let value: serde_json::Value = serde_json::from_str(&body).expect("json");

        assert_eq!(value["wallets"][0]["address"], A);
        let tx = &value["wallets"][0]["transactions"][0];
        assert_eq!(tx["id"], "a1");
        assert_eq!(tx["occurredAt"], "2024-01-01T00:00:00Z");
        assert_eq!(tx["outcome"], "Failed");
        assert!(value.get("errors").is_none());
    }
}
