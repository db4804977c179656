//! Shared data manager: the single entry point consumer modules use.
//!
//! Composes the two memoization stores (raw snapshots, derived views), the
//! derivation registry, and one fetcher per source. Consumer modules never
//! touch a fetcher or a store directly; they ask for the freshest valid
//! view for a (source, consumer, params) triple and the manager computes it
//! if necessary, de-duplicating work already in flight.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{info, warn};

use crate::domain::errors::{DataError, DataResult};
use crate::domain::models::{
    CacheConfig, ConsumerId, DeriveParams, DerivedKey, DerivedView, FetchParams, RawKey,
    RawSnapshot, SourceId,
};
use crate::domain::ports::RawFetcher;
use crate::services::derivation::{DerivationRegistry, BUILTIN_PAIRS};
use crate::services::memo_store::{MemoizationStore, StalePolicy};

/// Builder for [`SharedDataManager`]. Wiring errors (missing fetcher for a
/// required pair, missing derivation) surface here, at startup, instead of
/// on a live request path.
pub struct SharedDataManagerBuilder {
    fetchers: HashMap<SourceId, Arc<dyn RawFetcher>>,
    registry: DerivationRegistry,
    config: CacheConfig,
}

impl SharedDataManagerBuilder {
    pub fn new() -> Self {
        Self {
            fetchers: HashMap::new(),
            registry: DerivationRegistry::builtin(),
            config: CacheConfig::default(),
        }
    }

    /// Register the fetcher for its source. One fetcher per source; a
    /// second registration replaces the first.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn RawFetcher>) -> Self {
        self.fetchers.insert(fetcher.source(), fetcher);
        self
    }

    /// Replace the builtin derivation registry.
    pub fn with_registry(mut self, registry: DerivationRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Verify wiring and build the manager.
    pub fn build(self) -> DataResult<SharedDataManager> {
        // Every stock pair whose source has a fetcher must have a transform.
        let required: Vec<_> = BUILTIN_PAIRS
            .iter()
            .copied()
            .filter(|(source, _)| self.fetchers.contains_key(source))
            .collect();
        self.registry.verify_wiring(&required)?;

        let cooldown = self.config.failure_cooldown();
        Ok(SharedDataManager {
            raw_store: MemoizationStore::new(cooldown),
            derived_store: MemoizationStore::new(cooldown),
            registry: Arc::new(self.registry),
            fetchers: self.fetchers,
            config: self.config,
        })
    }
}

impl Default for SharedDataManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Façade over raw fetching, memoization, and derivation.
///
/// Calling the same operation with the same parameters from N concurrent
/// consumers results in at most one raw fetch and at most one derivation
/// per validity window, regardless of N.
pub struct SharedDataManager {
    raw_store: MemoizationStore<RawKey, RawSnapshot>,
    derived_store: MemoizationStore<DerivedKey, DerivedView>,
    registry: Arc<DerivationRegistry>,
    fetchers: HashMap<SourceId, Arc<dyn RawFetcher>>,
    config: CacheConfig,
}

impl SharedDataManager {
    pub fn builder() -> SharedDataManagerBuilder {
        SharedDataManagerBuilder::new()
    }

    fn policy(&self) -> StalePolicy {
        if self.config.serve_stale_on_error {
            StalePolicy::ServeStale
        } else {
            StalePolicy::FailFast
        }
    }

    fn fetch_params(&self) -> FetchParams {
        FetchParams {
            min_year: self.config.min_year,
        }
    }

    /// Get the freshest raw snapshot for a source, fetching if necessary.
    pub async fn raw_snapshot(
        &self,
        source: SourceId,
        params: FetchParams,
    ) -> DataResult<Arc<RawSnapshot>> {
        let fetcher = self
            .fetchers
            .get(&source)
            .cloned()
            .ok_or_else(|| DataError::FetchFailed {
                source_id: source,
                cause: "no fetcher registered for source".to_string(),
            })?;

        let key = RawKey {
            source,
            params: params.clone(),
        };
        self.raw_store
            .get_with_policy(key, self.config.raw_ttl(source), self.policy(), move || {
                async move { fetcher.fetch(&params).await }
            })
            .await
    }

    /// Get the freshest derived view for a (source, consumer) pair.
    ///
    /// This is the one retrieval operation everything else delegates to:
    /// raw snapshot through the first store (producer = the source's
    /// fetcher), then the view through the second store (producer = the
    /// registered transform over that snapshot).
    pub async fn get_view(
        &self,
        source: SourceId,
        consumer: ConsumerId,
        fetch: FetchParams,
        derive: DeriveParams,
    ) -> DataResult<Arc<DerivedView>> {
        let snapshot = self.raw_snapshot(source, fetch.clone()).await?;

        let key = DerivedKey {
            source,
            consumer,
            fetch,
            derive: derive.clone(),
        };
        let registry = Arc::clone(&self.registry);
        self.derived_store
            .get_with_policy(
                key,
                self.config.derived_ttl(),
                self.policy(),
                move || async move { registry.derive(source, consumer, &snapshot, &derive) },
            )
            .await
    }

    /// EGS offers shaped for the Future module (2017-2022, per-supplier
    /// series), optionally restricted to one EDC.
    pub async fn egs_for_future(&self, edc: Option<String>) -> DataResult<Arc<DerivedView>> {
        let derive = DeriveParams {
            edc,
            ..DeriveParams::default()
        };
        self.get_view(SourceId::Egs, ConsumerId::Future, self.fetch_params(), derive)
            .await
    }

    /// EGS offers shaped for the PTC module (EDC-level averages, optionally
    /// conforming offers only).
    pub async fn egs_for_ptc(
        &self,
        edc: Option<String>,
        conform: bool,
    ) -> DataResult<Arc<DerivedView>> {
        let derive = DeriveParams {
            edc,
            conform,
            ..DeriveParams::default()
        };
        self.get_view(SourceId::Egs, ConsumerId::Ptc, self.fetch_params(), derive)
            .await
    }

    /// EGS offers shaped for the Fees module (WattBuy rows with fee detail).
    pub async fn egs_for_fees(&self, edc: Option<String>) -> DataResult<Arc<DerivedView>> {
        let derive = DeriveParams {
            edc,
            ..DeriveParams::default()
        };
        self.get_view(SourceId::Egs, ConsumerId::Fees, self.fetch_params(), derive)
            .await
    }

    /// PJM LMP series for the requesting module, filtered to the EDC's zone
    /// and an optional date range.
    pub async fn pjm_for_module(
        &self,
        edc: Option<String>,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> DataResult<Arc<DerivedView>> {
        let derive = DeriveParams {
            edc,
            date_range,
            ..DeriveParams::default()
        };
        self.get_view(SourceId::Pjm, ConsumerId::Pjm, self.fetch_params(), derive)
            .await
    }

    /// Prefetch raw snapshots for every registered source, concurrently.
    ///
    /// Intended for startup warm-up so first-paint requests hit a warm
    /// cache. One source failing does not abort the others; each result is
    /// reported per source, with the snapshot row count on success.
    pub async fn warm(&self) -> Vec<(SourceId, DataResult<usize>)> {
        let fetches = self.fetchers.keys().copied().map(|source| {
            let params = self.fetch_params();
            async move {
                let result = self
                    .raw_snapshot(source, params)
                    .await
                    .map(|snapshot| snapshot.len());
                if let Err(error) = &result {
                    warn!(%source, %error, "warm-up fetch failed");
                }
                (source, result)
            }
        });
        join_all(fetches).await
    }

    /// Drop the raw snapshot for a source and every view derived from it.
    /// Subsequent requests behave as a cold cache for that source only.
    pub async fn invalidate_source(&self, source: SourceId) {
        info!(%source, "invalidating source and derived views");
        self.raw_store.invalidate_if(|key| key.source == source).await;
        self.derived_store
            .invalidate_if(|key| key.source == source)
            .await;
    }

    /// Drop everything: the global force-refresh trigger.
    pub async fn force_refresh(&self) {
        info!("force refresh: clearing all cached data");
        self.raw_store.clear().await;
        self.derived_store.clear().await;
    }

    /// Entry counts for (raw, derived) stores. Diagnostic only.
    pub async fn entry_counts(&self) -> (usize, usize) {
        (
            self.raw_store.entry_count().await,
            self.derived_store.entry_count().await,
        )
    }
}
