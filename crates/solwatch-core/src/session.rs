//! Monitor session: the set of watched addresses, their histories, and the
//! scheduler that refreshes them.
//!
//! Every address is refreshed by one batched scheduler per session. A fetch
//! claims its addresses by holding their fetch lock; a second tick that finds
//! an address claimed is skipped. The claim is a lock guard, so a fetch whose
//! future is dropped mid-flight releases its addresses. Each registration
//! carries a generation number and results are applied only while the
//! address is still registered under that generation, so a deregistered
//! address is never resurrected by a fetch that was already running.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::fanout::FanOut;
use crate::fetcher::{AddressFetcher, FetchError};
use crate::history;
use crate::ledger_source::{LedgerSource, SourceError};
use crate::{Address, ConfigError, SessionError, TransactionRecord, UtcDateTime};

/// Health of the most recent polls of one address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollHealth {
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub last_success_at: Option<UtcDateTime>,
}

/// Everything the session holds for one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressState {
    pub address: Address,
    /// Most recent first, deduplicated by id, bounded by the history depth.
    pub transactions: Vec<TransactionRecord>,
    pub health: PollHealth,
}

impl AddressState {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            transactions: Vec::new(),
            health: PollHealth::default(),
        }
    }

    fn apply_success(&mut self, fetched: &[TransactionRecord], bound: usize) -> usize {
        let merged = history::merge(&self.transactions, fetched, bound);
        let added = history::count_new(&self.transactions, &merged);
        self.transactions = merged;
        self.health = PollHealth {
            last_error: None,
            consecutive_failures: 0,
            last_success_at: Some(UtcDateTime::now()),
        };
        added
    }

    fn apply_failure(&mut self, error: &FetchError) {
        self.health.last_error = Some(error.cause.to_string());
        self.health.consecutive_failures = self.health.consecutive_failures.saturating_add(1);
    }
}

pub type Snapshot = BTreeMap<Address, AddressState>;

/// Result of one fetch-and-merge for one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Merged { new_records: usize },
    /// History untouched; the failure is recorded in [`PollHealth`].
    Failed(FetchError),
    /// Another fetch for this address was still running.
    Skipped,
    NotRegistered,
    /// The address was deregistered while its fetch was running.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Newly registered; carries the outcome of the immediate first fetch.
    Registered(TickOutcome),
    AlreadyActive,
}

#[derive(Debug)]
struct AddressEntry {
    state: AddressState,
    generation: u64,
    fetch_lock: Arc<Mutex<()>>,
}

/// An address held for one fetch-and-merge.
struct Claim {
    address: Address,
    generation: u64,
    _guard: OwnedMutexGuard<()>,
}

impl AddressEntry {
    fn new(address: Address, generation: u64) -> Self {
        Self {
            state: AddressState::new(address),
            generation,
            fetch_lock: Arc::new(Mutex::new(())),
        }
    }

    /// `None` while another fetch holds this address.
    fn claim(&self) -> Option<Claim> {
        let guard = Arc::clone(&self.fetch_lock).try_lock_owned().ok()?;
        Some(Claim {
            address: self.state.address.clone(),
            generation: self.generation,
            _guard: guard,
        })
    }
}

#[derive(Debug, Default)]
struct SessionState {
    entries: HashMap<Address, AddressEntry>,
    scheduler: Option<JoinHandle<()>>,
    next_generation: u64,
    closed: bool,
}

impl SessionState {
    fn stop_scheduler(&mut self) -> bool {
        match self.scheduler.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

struct SessionInner {
    fan_out: FanOut,
    history_depth: usize,
    poll_interval: Duration,
    state: RwLock<SessionState>,
}

/// Watches a changing set of addresses.
///
/// Dropping the session stops its scheduler.
pub struct MonitorSession {
    inner: Arc<SessionInner>,
    shutdown: watch::Sender<bool>,
}

impl MonitorSession {
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` fails validation.
    pub fn new(source: Arc<dyn LedgerSource>, config: &MonitorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let fetcher = AddressFetcher::from_config(source, config);
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(SessionInner {
                fan_out: FanOut::new(fetcher, config.max_concurrency),
                history_depth: config.history_depth,
                poll_interval: config.poll_interval,
                state: RwLock::new(SessionState::default()),
            }),
            shutdown,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    pub fn history_depth(&self) -> usize {
        self.inner.history_depth
    }

    /// Starts watching `address` and fetches it once right away.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidAddress`] before any I/O, or
    /// [`SessionError::Closed`] after [`shutdown`](Self::shutdown).
    pub async fn register(&self, address: &str) -> Result<Registration, SessionError> {
        let address = Address::parse(address)?;

        let claim = {
            let mut state = self.inner.state.write().await;
            if state.closed {
                return Err(SessionError::Closed);
            }
            if state.entries.contains_key(&address) {
                debug!(%address, "address already active");
                return Ok(Registration::AlreadyActive);
            }

            let generation = state.next_generation;
            state.next_generation += 1;
            let entry = AddressEntry::new(address.clone(), generation);
            let claim = entry.claim();
            state.entries.insert(address.clone(), entry);
            self.ensure_scheduler(&mut state);
            info!(%address, generation, active = state.entries.len(), "address registered");
            claim
        };

        let mut outcomes = self.inner.fetch_and_apply(claim.into_iter().collect()).await;
        let outcome = outcomes.remove(&address).unwrap_or(TickOutcome::Discarded);
        Ok(Registration::Registered(outcome))
    }

    /// Stops watching `address` and discards its state. Returns `false` when
    /// the address was not registered.
    pub async fn deregister(&self, address: &str) -> bool {
        let Ok(address) = Address::parse(address) else {
            return false;
        };

        let mut state = self.inner.state.write().await;
        if state.entries.remove(&address).is_none() {
            return false;
        }
        info!(%address, active = state.entries.len(), "address deregistered");

        if state.entries.is_empty() && state.stop_scheduler() {
            debug!("no active addresses left; scheduler stopped");
        }
        true
    }

    /// One fetch-and-merge for a single registered address.
    pub async fn tick(&self, address: &Address) -> TickOutcome {
        self.inner.tick(address).await
    }

    /// One batched pass over every active address not already in flight.
    pub async fn tick_all(&self) -> BTreeMap<Address, TickOutcome> {
        self.inner.tick_all().await
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.inner.snapshot().await
    }

    pub async fn active_addresses(&self) -> Vec<Address> {
        let state = self.inner.state.read().await;
        let mut addresses: Vec<Address> = state.entries.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub async fn scheduler_running(&self) -> bool {
        let state = self.inner.state.read().await;
        state
            .scheduler
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.state.read().await.closed
    }

    /// Stops the scheduler, refuses further registrations, and returns the
    /// final state of every address.
    pub async fn shutdown(&self) -> Snapshot {
        self.shutdown.send_replace(true);

        let mut state = self.inner.state.write().await;
        state.closed = true;
        state.stop_scheduler();
        let snapshot: Snapshot = state
            .entries
            .drain()
            .map(|(address, entry)| (address, entry.state))
            .collect();

        info!(addresses = snapshot.len(), "monitor session shut down");
        snapshot
    }

    fn ensure_scheduler(&self, state: &mut SessionState) {
        let running = state
            .scheduler
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if running {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let shutdown = self.shutdown.subscribe();
        state.scheduler = Some(tokio::spawn(run_scheduler(inner, shutdown)));
        debug!(interval_ms = self.inner.poll_interval.as_millis() as u64, "scheduler started");
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        if let Ok(mut state) = self.inner.state.try_write() {
            state.stop_scheduler();
        }
    }
}

impl std::fmt::Debug for MonitorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSession")
            .field("history_depth", &self.inner.history_depth)
            .field("poll_interval", &self.inner.poll_interval)
            .finish_non_exhaustive()
    }
}

async fn run_scheduler(inner: Arc<SessionInner>, mut shutdown: watch::Receiver<bool>) {
    let period = inner.poll_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let outcomes = inner.tick_all().await;
                let failed = outcomes
                    .values()
                    .filter(|outcome| matches!(outcome, TickOutcome::Failed(_)))
                    .count();
                debug!(addresses = outcomes.len(), failed, "scheduled pass complete");
            }
        }
    }
    debug!("scheduler exited");
}

impl SessionInner {
    async fn snapshot(&self) -> Snapshot {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .map(|(address, entry)| (address.clone(), entry.state.clone()))
            .collect()
    }

    async fn tick(&self, address: &Address) -> TickOutcome {
        let claim = {
            let state = self.state.read().await;
            let Some(entry) = state.entries.get(address) else {
                return TickOutcome::NotRegistered;
            };
            match entry.claim() {
                Some(claim) => claim,
                None => return TickOutcome::Skipped,
            }
        };

        self.fetch_and_apply(vec![claim])
            .await
            .remove(address)
            .unwrap_or(TickOutcome::Discarded)
    }

    async fn tick_all(&self) -> BTreeMap<Address, TickOutcome> {
        let mut outcomes = BTreeMap::new();
        let claimed: Vec<Claim> = {
            let state = self.state.read().await;
            let mut claimed = Vec::with_capacity(state.entries.len());
            for (address, entry) in &state.entries {
                match entry.claim() {
                    Some(claim) => claimed.push(claim),
                    None => {
                        outcomes.insert(address.clone(), TickOutcome::Skipped);
                    }
                }
            }
            claimed
        };

        outcomes.extend(self.fetch_and_apply(claimed).await);
        outcomes
    }

    /// Fetches every claimed address in one fan-out call and applies each
    /// result if its registration is still current.
    async fn fetch_and_apply(&self, claimed: Vec<Claim>) -> BTreeMap<Address, TickOutcome> {
        if claimed.is_empty() {
            return BTreeMap::new();
        }

        let addresses: Vec<Address> = claimed.iter().map(|claim| claim.address.clone()).collect();
        let mut results = match self.fan_out.fetch_all(&addresses, self.history_depth).await {
            Ok(results) => results,
            Err(error) => {
                warn!(error = %error, "fan-out pass rejected");
                BTreeMap::new()
            }
        };

        let mut state = self.state.write().await;
        let mut outcomes = BTreeMap::new();
        for Claim { address, generation, _guard } in claimed {
            let outcome = match state.entries.get_mut(&address) {
                Some(entry) if entry.generation == generation => {
                    let result = results.remove(&address).unwrap_or_else(|| {
                        Err(FetchError {
                            address: address.clone(),
                            cause: SourceError::internal("fan-out returned no result"),
                        })
                    });
                    match result {
                        Ok(records) => TickOutcome::Merged {
                            new_records: entry.state.apply_success(&records, self.history_depth),
                        },
                        Err(error) => {
                            entry.state.apply_failure(&error);
                            TickOutcome::Failed(error)
                        }
                    }
                }
                _ => {
                    debug!(%address, generation, "discarding result for deregistered address");
                    TickOutcome::Discarded
                }
            };
            outcomes.insert(address, outcome);
        }
        outcomes
    }
}
