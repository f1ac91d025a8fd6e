//! Upstream ledger provider contract.
//!
//! A [`LedgerSource`] answers one question: "what are the most recent
//! transactions touching this address?" It returns the provider's raw
//! descriptors untouched; mapping them into [`TransactionRecord`]s is the job
//! of [`crate::normalize`].
//!
//! [`TransactionRecord`]: crate::TransactionRecord

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Address;

/// Provider-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Transport failure, open circuit, or 5xx.
    Unavailable,
    /// The provider (or the local request budget) refused for now.
    RateLimited,
    Timeout,
    /// Non-retryable refusal: 4xx status or a JSON-RPC error object.
    Rejected,
    /// The top-level response could not be understood.
    MalformedResponse,
    Internal,
}

/// Structured upstream error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Rejected,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::MalformedResponse,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::Rejected => "source.rejected",
            SourceErrorKind::MalformedResponse => "source.malformed_response",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Provider-specific transaction descriptor, not yet normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTransaction(Value);

impl RawTransaction {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for RawTransaction {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Upstream ledger-data provider.
///
/// Implementations must be `Send + Sync`: one source is shared by every
/// concurrent fetch of a fan-out pass.
pub trait LedgerSource: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Returns up to `limit` raw descriptors for `address`, most recent
    /// first, in the provider's own order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport failure, a non-success status, or
    /// a response whose top-level shape is not understood. A single bad
    /// descriptor is not an error; it is passed through for the normalizer
    /// to reject.
    fn recent_transactions<'a>(
        &'a self,
        address: &'a Address,
        limit: usize,
    ) -> SourceFuture<'a, Vec<RawTransaction>>;
}
