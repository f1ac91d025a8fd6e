use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::MonitorConfig;
use crate::http_client::{HttpClient, HttpErrorKind, HttpRequest, ReqwestHttpClient};
use crate::ledger_source::{LedgerSource, RawTransaction, SourceError, SourceFuture};
use crate::throttling::{RequestThrottle, ThrottleConfig};
use crate::Address;

const RPC_RATE_LIMITED: i64 = 429;
const RPC_NODE_UNHEALTHY: i64 = -32005;

/// Solana JSON-RPC provider (public RPC, Helius, or any compatible node).
///
/// One fetch is a `getSignaturesForAddress` listing followed by concurrent
/// `getTransaction` lookups; each signature's listing entry and detail are
/// joined into one raw descriptor.
pub struct SolanaRpcSource {
    http_client: Arc<dyn HttpClient>,
    rpc_url: String,
    commitment: String,
    request_timeout: Duration,
    circuit_breaker: Arc<CircuitBreaker>,
    throttle: RequestThrottle,
    next_id: AtomicU64,
}

impl SolanaRpcSource {
    pub fn new(http_client: Arc<dyn HttpClient>, rpc_url: impl Into<String>) -> Self {
        Self {
            http_client,
            rpc_url: rpc_url.into(),
            commitment: String::from("confirmed"),
            request_timeout: Duration::from_millis(3_000),
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            throttle: RequestThrottle::new(ThrottleConfig::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Production source over reqwest, configured from `config`.
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()), config)
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>, config: &MonitorConfig) -> Self {
        Self {
            commitment: config.commitment.clone(),
            request_timeout: config.request_timeout,
            circuit_breaker: Arc::new(CircuitBreaker::new(config.circuit_breaker)),
            throttle: RequestThrottle::new(config.throttle.clone()),
            ..Self::new(http_client, config.rpc_url.clone())
        }
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    async fn call(&self, method: &'static str, params: Value) -> Result<Value, SourceError> {
        if let Err(remaining) = self.circuit_breaker.check() {
            return Err(SourceError::unavailable(format!(
                "solana rpc circuit breaker is open; skipping {method} for {}ms",
                remaining.as_millis()
            )));
        }

        self.throttle.acquire().await?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let request = HttpRequest::post_json(&self.rpc_url, &body)
            .with_timeout_ms(self.request_timeout.as_millis() as u64);

        let response = self.http_client.execute(request).await.map_err(|error| {
            self.circuit_breaker.record_failure();
            match error.kind() {
                HttpErrorKind::Timeout => {
                    SourceError::timeout(format!("{method} timed out: {}", error.message()))
                }
                _ if error.retryable() => {
                    SourceError::unavailable(format!("{method} transport error: {}", error.message()))
                }
                _ => SourceError::internal(format!("{method} transport error: {}", error.message())),
            }
        })?;

        if !response.is_success() {
            return Err(self.status_error(method, response.status));
        }

        let envelope: RpcEnvelope = serde_json::from_str(&response.body).map_err(|error| {
            self.circuit_breaker.record_failure();
            SourceError::malformed(format!("{method} returned unparsable body: {error}"))
        })?;

        if let Some(error) = envelope.error {
            return Err(self.rpc_error(method, error));
        }

        self.circuit_breaker.record_success();
        Ok(envelope.result.unwrap_or(Value::Null))
    }

    fn status_error(&self, method: &str, status: u16) -> SourceError {
        match status {
            429 => {
                self.circuit_breaker.record_failure();
                SourceError::rate_limited(format!("{method} was rate limited (status 429)"))
            }
            408 | 500..=599 => {
                self.circuit_breaker.record_failure();
                SourceError::unavailable(format!("{method} upstream returned status {status}"))
            }
            _ => SourceError::rejected(format!("{method} upstream returned status {status}")),
        }
    }

    fn rpc_error(&self, method: &str, error: RpcErrorObject) -> SourceError {
        let message = format!("{method} rpc error {}: {}", error.code, error.message);
        match error.code {
            RPC_RATE_LIMITED => {
                self.circuit_breaker.record_failure();
                SourceError::rate_limited(message)
            }
            RPC_NODE_UNHEALTHY => {
                self.circuit_breaker.record_failure();
                SourceError::unavailable(message)
            }
            _ => {
                // The node answered; only the request was refused.
                self.circuit_breaker.record_success();
                SourceError::rejected(message)
            }
        }
    }

    async fn signatures_for_address(
        &self,
        address: &Address,
        limit: usize,
    ) -> Result<Vec<Value>, SourceError> {
        let result = self
            .call(
                "getSignaturesForAddress",
                json!([address.as_str(), { "limit": limit, "commitment": self.commitment }]),
            )
            .await?;

        match result {
            Value::Array(entries) => Ok(entries),
            other => Err(SourceError::malformed(format!(
                "getSignaturesForAddress result must be an array, found {}",
                short_kind(&other)
            ))),
        }
    }

    async fn transaction_detail(&self, signature: &str) -> Result<Option<Value>, SourceError> {
        let result = self
            .call(
                "getTransaction",
                json!([
                    signature,
                    {
                        "encoding": "jsonParsed",
                        "commitment": self.commitment,
                        "maxSupportedTransactionVersion": 0
                    }
                ]),
            )
            .await?;

        Ok((!result.is_null()).then_some(result))
    }

    async fn describe(&self, entry: Value) -> Result<Option<RawTransaction>, SourceError> {
        let Some(signature) = entry.get("signature").and_then(Value::as_str).map(str::to_owned)
        else {
            // Let the normalizer reject and log it.
            return Ok(Some(RawTransaction::new(entry)));
        };

        match self.transaction_detail(&signature).await? {
            Some(detail) => Ok(Some(join_descriptor(entry, detail))),
            None => {
                debug!(%signature, "transaction detail not yet available");
                Ok(None)
            }
        }
    }
}

impl LedgerSource for SolanaRpcSource {
    fn name(&self) -> &str {
        "solana-rpc"
    }

    fn recent_transactions<'a>(
        &'a self,
        address: &'a Address,
        limit: usize,
    ) -> SourceFuture<'a, Vec<RawTransaction>> {
        Box::pin(async move {
            let mut listing = self.signatures_for_address(address, limit).await?;
            listing.truncate(limit);
            let listed = listing.len();

            let lookups = join_all(listing.into_iter().map(|entry| self.describe(entry))).await;

            let mut descriptors = Vec::with_capacity(listed);
            let mut first_error = None;
            for lookup in lookups {
                match lookup {
                    Ok(Some(descriptor)) => descriptors.push(descriptor),
                    Ok(None) => {}
                    Err(error) => {
                        warn!(%address, error = %error, "transaction detail lookup failed; skipping");
                        first_error.get_or_insert(error);
                    }
                }
            }

            // Every lookup failing means the provider is down, not that the
            // records are bad.
            if descriptors.is_empty() {
                if let Some(error) = first_error {
                    return Err(error);
                }
            }

            debug!(%address, listed, described = descriptors.len(), "fetched transaction descriptors");
            Ok(descriptors)
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Detail fields win; the listing fills in what the detail lacks.
fn join_descriptor(listing: Value, detail: Value) -> RawTransaction {
    let Value::Object(mut descriptor) = detail else {
        return RawTransaction::new(detail);
    };
    let Value::Object(listing) = listing else {
        return RawTransaction::new(Value::Object(descriptor));
    };

    for key in ["signature", "blockTime", "err", "slot"] {
        fill_missing(&mut descriptor, &listing, key);
    }
    RawTransaction::new(Value::Object(descriptor))
}

fn fill_missing(descriptor: &mut Map<String, Value>, listing: &Map<String, Value>, key: &str) {
    let missing = descriptor.get(key).map_or(true, Value::is_null);
    if missing {
        if let Some(value) = listing.get(key) {
            descriptor.insert(key.to_owned(), value.clone());
        }
    }
}

fn short_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        _ => "scalar",
    }
}
