//! Raw fetcher port.

use async_trait::async_trait;

use crate::domain::errors::DataResult;
use crate::domain::models::{FetchParams, RawSnapshot, SourceId};

/// Interface for fetching one raw dataset snapshot from a source.
///
/// Implementations perform the actual I/O (database queries, HTTP calls)
/// and nothing else: no caching, no de-duplication. The memoization store
/// decides when a fetcher runs; fetchers for different sources may run
/// concurrently.
#[async_trait]
pub trait RawFetcher: Send + Sync {
    /// The source this fetcher serves.
    fn source(&self) -> SourceId;

    /// Fetch a fresh snapshot.
    async fn fetch(&self, params: &FetchParams) -> DataResult<RawSnapshot>;
}
