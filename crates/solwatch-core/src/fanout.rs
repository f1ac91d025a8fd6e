use std::collections::{BTreeMap, BTreeSet};

use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::fetcher::{AddressFetcher, FetchError};
use crate::{Address, PreconditionError, TransactionRecord};

pub type FanOutResults = BTreeMap<Address, Result<Vec<TransactionRecord>, FetchError>>;

/// Concurrent fetch of many addresses, each isolated from the others.
#[derive(Debug, Clone)]
pub struct FanOut {
    fetcher: AddressFetcher,
    max_concurrency: usize,
}

impl FanOut {
    pub fn new(fetcher: AddressFetcher, max_concurrency: usize) -> Self {
        Self {
            fetcher,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// One entry per distinct address in `addresses`; a failed address
    /// never affects another.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError`] for an empty address set or a zero
    /// limit, before any fetch starts.
    pub async fn fetch_all(
        &self,
        addresses: &[Address],
        limit: usize,
    ) -> Result<FanOutResults, PreconditionError> {
        if addresses.is_empty() {
            return Err(PreconditionError::EmptyAddressSet);
        }
        if limit == 0 {
            return Err(PreconditionError::ZeroLimit);
        }

        let distinct: Vec<Address> = addresses
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        debug!(
            addresses = distinct.len(),
            limit,
            max_concurrency = self.max_concurrency,
            "starting fan-out pass"
        );

        let results: FanOutResults = stream::iter(distinct)
            .map(|address| {
                let fetcher = self.fetcher.clone();
                async move {
                    let result = fetcher.fetch_recent(&address, limit).await;
                    (address, result)
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let failed = results.values().filter(|result| result.is_err()).count();
        debug!(addresses = results.len(), failed, "fan-out pass complete");
        Ok(results)
    }
}
