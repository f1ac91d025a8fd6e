use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{json, Value};

use crate::ledger_source::{LedgerSource, RawTransaction, SourceError, SourceFuture};
use crate::Address;

/// What a [`FixtureSource`] answers once an address has no scripted
/// responses left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Empty,
    /// A deterministic rolling window per address; each call reveals one
    /// newer transaction.
    Synthetic,
}

type Scripted = Result<Vec<RawTransaction>, SourceError>;

/// Offline [`LedgerSource`] with per-address scripted responses.
#[derive(Debug)]
pub struct FixtureSource {
    scripts: Mutex<HashMap<Address, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<Address, usize>>,
    fallback: Fallback,
    latency: Duration,
}

impl Default for FixtureSource {
    fn default() -> Self {
        Self::new(Fallback::Empty)
    }
}

impl FixtureSource {
    pub fn new(fallback: Fallback) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            fallback,
            latency: Duration::ZERO,
        }
    }

    pub fn synthetic() -> Self {
        Self::new(Fallback::Synthetic)
    }

    /// Delay applied to every call before it answers.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_response(&self, address: &Address, descriptors: Vec<RawTransaction>) {
        self.push(address, Ok(descriptors));
    }

    pub fn push_failure(&self, address: &Address, error: SourceError) {
        self.push(address, Err(error));
    }

    /// Calls made so far for `address`.
    pub fn calls(&self, address: &Address) -> usize {
        lock(&self.calls).get(address).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    fn push(&self, address: &Address, scripted: Scripted) {
        lock(&self.scripts)
            .entry(address.clone())
            .or_default()
            .push_back(scripted);
    }

    fn answer(&self, address: &Address, limit: usize) -> Scripted {
        let call = {
            let mut calls = lock(&self.calls);
            let counter = calls.entry(address.clone()).or_insert(0);
            *counter += 1;
            *counter - 1
        };

        if let Some(scripted) = lock(&self.scripts)
            .get_mut(address)
            .and_then(VecDeque::pop_front)
        {
            return scripted.map(|mut descriptors| {
                descriptors.truncate(limit);
                descriptors
            });
        }

        match self.fallback {
            Fallback::Empty => Ok(Vec::new()),
            Fallback::Synthetic => Ok(synthetic_window(address, call, limit)),
        }
    }
}

impl LedgerSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    fn recent_transactions<'a>(
        &'a self,
        address: &'a Address,
        limit: usize,
    ) -> SourceFuture<'a, Vec<RawTransaction>> {
        Box::pin(async move {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.answer(address, limit)
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Builds a descriptor in the joined listing/detail shape the normalizer
/// reads.
pub fn raw_descriptor(signature: &str, block_time: Option<i64>, failed: bool) -> RawTransaction {
    let err = if failed {
        json!({ "InstructionError": [0, { "Custom": 1 }] })
    } else {
        Value::Null
    };

    RawTransaction::new(json!({
        "signature": signature,
        "blockTime": block_time,
        "err": err,
        "meta": { "err": err },
        "transaction": {
            "signatures": [signature],
            "message": {
                "instructions": [{
                    "program": "system",
                    "programId": "11111111111111111111111111111111",
                    "parsed": { "type": "transfer" }
                }]
            }
        }
    }))
}

const SYNTHETIC_EPOCH: i64 = 1_704_067_200;

fn synthetic_window(address: &Address, call: usize, limit: usize) -> Vec<RawTransaction> {
    let seed: i64 = address.as_str().bytes().map(i64::from).sum();
    let prefix: String = address.as_str().chars().take(8).collect();
    let newest = call + limit;

    (call + 1..=newest)
        .rev()
        .map(|sequence| {
            let sequence = sequence as i64;
            raw_descriptor(
                &format!("{prefix}-{sequence:06}"),
                Some(SYNTHETIC_EPOCH + seed * 60 + sequence * 45),
                sequence % 7 == 0,
            )
        })
        .collect()
}
