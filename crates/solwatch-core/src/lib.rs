//! # Solwatch Core
//!
//! Multi-address Solana transaction monitoring engine.
//!
//! ## Overview
//!
//! Given a set of account addresses, the engine repeatedly queries an
//! upstream ledger provider, normalizes the returned transactions into one
//! schema, merges them into a bounded per-address history, and isolates
//! per-address failures so one bad wallet never stalls the others.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Solana JSON-RPC provider and the deterministic fixture provider |
//! | [`circuit_breaker`] | Circuit breaker for upstream calls |
//! | [`config`] | `MonitorConfig` and its environment variables |
//! | [`domain`] | Address, transaction record, timestamp |
//! | [`error`] | Error taxonomy |
//! | [`fanout`] | Bounded concurrent fetch of many addresses |
//! | [`feed`] | One-shot request/response surface |
//! | [`fetcher`] | Fetch and normalize one address |
//! | [`history`] | Bounded, deduplicated history merge |
//! | [`http_client`] | HTTP client abstraction |
//! | [`ledger_source`] | Upstream provider trait |
//! | [`normalize`] | Provider descriptor to `TransactionRecord` |
//! | [`retry`] | Retry policy with backoff |
//! | [`session`] | Monitor session lifecycle and scheduler |
//! | [`throttling`] | Client-side request budget |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use solwatch_core::{MonitorConfig, MonitorSession, SolanaRpcSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::from_env()?;
//!     let source = Arc::new(SolanaRpcSource::from_config(&config));
//!     let session = MonitorSession::new(source, &config)?;
//!
//!     session.register("So11111111111111111111111111111111111111112").await?;
//!     for (address, state) in session.snapshot().await {
//!         println!("{address}: {} transactions", state.transactions.len());
//!     }
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ MonitorSession  │──── scheduler (one per session)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ FanOut          │────▶│ AddressFetcher   │── normalize
//! └─────────────────┘     └────────┬─────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Circuit Breaker │◀────│ LedgerSource     │
//! │ RequestThrottle │     │ (Solana RPC)     │
//! └─────────────────┘     └────────┬─────────┘
//!                                  │
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │ HTTP Client      │
//!                         └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Upstream failures are [`SourceError`]s with a stable code:
//!
//! ```rust
//! use solwatch_core::{SourceError, SourceErrorKind};
//!
//! fn handle_error(error: SourceError) {
//!     match error.kind() {
//!         SourceErrorKind::RateLimited => {
//!             // Next pass will try again
//!         }
//!         SourceErrorKind::Rejected => {
//!             // Report to user
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! Inside a session a failed fetch only updates the address's poll health;
//! its history is left as it was.

pub mod adapters;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod error;
pub mod fanout;
pub mod feed;
pub mod fetcher;
pub mod history;
pub mod http_client;
pub mod ledger_source;
pub mod normalize;
pub mod retry;
pub mod session;
pub mod throttling;

// Adapter implementations
pub use adapters::{raw_descriptor, Fallback, FixtureSource, SolanaRpcSource};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Configuration
pub use config::{MonitorConfig, DEFAULT_RPC_URL};

// Domain models
pub use domain::{Address, Operation, Outcome, TransactionRecord, UtcDateTime};

// Error types
pub use error::{
    ConfigError, CoreError, InvalidAddress, NormalizationError, PreconditionError, SessionError,
};

// Fetching
pub use fanout::{FanOut, FanOutResults};
pub use fetcher::{AddressFetcher, FetchError};

// Request surface
pub use feed::{MonitorFeed, MonitorRequest, MonitorResponse, WalletError, WalletTransactions};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Upstream provider contract
pub use ledger_source::{LedgerSource, RawTransaction, SourceError, SourceErrorKind, SourceFuture};

pub use normalize::normalize;

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Session
pub use session::{AddressState, MonitorSession, PollHealth, Registration, Snapshot, TickOutcome};

// Throttling
pub use throttling::{RequestThrottle, ThrottleConfig};
