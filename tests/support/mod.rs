//! Shared fixtures for the behavior tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use solwatch_core::{
    Address, AddressState, FixtureSource, HttpClient, HttpError, HttpRequest, HttpResponse,
    LedgerSource, MonitorConfig, RawTransaction, RetryConfig, SourceFuture,
};
use tokio::sync::{Notify, Semaphore};

pub const WALLET_A: &str = "So11111111111111111111111111111111111111112";
pub const WALLET_B: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const WALLET_C: &str = "11111111111111111111111111111111";

pub fn addr(raw: &str) -> Address {
    Address::parse(raw).expect("test address is valid")
}

/// No retries and a poll interval long enough that the scheduler never
/// fires during a test.
pub fn quiet_config() -> MonitorConfig {
    MonitorConfig::default()
        .with_retry(RetryConfig::no_retry())
        .with_poll_interval(Duration::from_secs(3_600))
}

pub fn ids(state: &AddressState) -> Vec<&str> {
    state
        .transactions
        .iter()
        .map(|record| record.id.as_str())
        .collect()
}

/// Fixture source whose calls can be held open until the test releases
/// them.
pub struct GatedSource {
    inner: FixtureSource,
    armed: AtomicBool,
    gate: Semaphore,
    entered: Notify,
}

impl GatedSource {
    pub fn new(inner: FixtureSource) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            gate: Semaphore::new(0),
            entered: Notify::new(),
        }
    }

    pub fn fixture(&self) -> &FixtureSource {
        &self.inner
    }

    /// Calls made from now on wait for [`release`](Self::release).
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, calls: usize) {
        self.gate.add_permits(calls);
    }

    /// Resolves once an armed call is waiting at the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }
}

impl LedgerSource for GatedSource {
    fn name(&self) -> &str {
        "gated-fixture"
    }

    fn recent_transactions<'a>(
        &'a self,
        address: &'a Address,
        limit: usize,
    ) -> SourceFuture<'a, Vec<RawTransaction>> {
        Box::pin(async move {
            if self.armed.load(Ordering::SeqCst) {
                self.entered.notify_one();
                if let Ok(permit) = self.gate.acquire().await {
                    permit.forget();
                }
            }
            self.inner.recent_transactions(address, limit).await
        })
    }
}

/// HTTP client that answers JSON-RPC calls by method and records every
/// request.
#[derive(Default)]
pub struct ScriptedRpc {
    listings: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    details: Mutex<HashMap<String, Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedRpc {
    pub fn listing(&self, response: Result<HttpResponse, HttpError>) -> &Self {
        self.listings.lock().expect("listings").push_back(response);
        self
    }

    pub fn listing_of(&self, signatures: &[&str]) -> &Self {
        let entries: Vec<Value> = signatures
            .iter()
            .map(|signature| json!({ "signature": signature, "slot": 250_000_000, "err": null, "blockTime": null }))
            .collect();
        self.listing(Ok(rpc_result(Value::Array(entries))))
    }

    pub fn detail(&self, signature: &str, response: Result<HttpResponse, HttpError>) -> &Self {
        self.details
            .lock()
            .expect("details")
            .insert(signature.to_owned(), response);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests").clone()
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.requests()
            .iter()
            .map(|request| {
                serde_json::from_str(request.body.as_deref().unwrap_or("null")).expect("json body")
            })
            .collect()
    }

    pub fn methods(&self) -> Vec<String> {
        self.bodies()
            .iter()
            .map(|body| body["method"].as_str().unwrap_or_default().to_owned())
            .collect()
    }
}

impl HttpClient for ScriptedRpc {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let body: Value =
            serde_json::from_str(request.body.as_deref().unwrap_or("null")).unwrap_or_default();
        self.requests.lock().expect("requests").push(request);

        let response = match body["method"].as_str() {
            Some("getSignaturesForAddress") => self
                .listings
                .lock()
                .expect("listings")
                .pop_front()
                .unwrap_or_else(|| Ok(rpc_result(json!([])))),
            Some("getTransaction") => {
                let signature = body["params"][0].as_str().unwrap_or_default();
                self.details
                    .lock()
                    .expect("details")
                    .get(signature)
                    .cloned()
                    .unwrap_or_else(|| Ok(rpc_result(Value::Null)))
            }
            _ => Ok(HttpResponse::with_status(404, "")),
        };
        Box::pin(async move { response })
    }
}

pub fn rpc_result(result: Value) -> HttpResponse {
    HttpResponse::ok_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string())
}

pub fn rpc_error(code: i64, message: &str) -> HttpResponse {
    HttpResponse::ok_json(
        json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": code, "message": message } })
            .to_string(),
    )
}

/// A `getTransaction` result in `jsonParsed` encoding.
pub fn parsed_transaction(signature: &str, block_time: i64, failed: bool) -> Value {
    let err = if failed {
        json!({ "InstructionError": [1, { "Custom": 6001 }] })
    } else {
        Value::Null
    };

    json!({
        "slot": 250_000_000,
        "blockTime": block_time,
        "version": 0,
        "meta": {
            "err": err,
            "fee": 5000,
            "status": if failed { json!({ "Err": err }) } else { json!({ "Ok": null }) }
        },
        "transaction": {
            "signatures": [signature],
            "message": {
                "accountKeys": [],
                "recentBlockhash": "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N",
                "instructions": [
                    {
                        "program": "system",
                        "programId": "11111111111111111111111111111111",
                        "parsed": {
                            "type": "transfer",
                            "info": { "lamports": 1_000_000 }
                        },
                        "stackHeight": null
                    },
                    {
                        "programId": "ComputeBudget111111111111111111111111111111",
                        "accounts": [],
                        "data": "3DTZbgwsozUF",
                        "stackHeight": null
                    }
                ]
            }
        }
    })
}
