//! End-to-end tests for the shared data manager.
//!
//! Uses counting mock fetchers and counting derivation wrappers to verify
//! the core guarantee: N concurrent consumers, at most one raw fetch and
//! one derivation per (source, consumer, params) per validity window.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eres_data::services::BUILTIN_PAIRS;
use eres_data::{
    CacheConfig, DataError, DataResult, DerivationRegistry, DerivedView, EgsRecord, EgsSource,
    FetchParams, PjmRecord, RawFetcher, RawSnapshot, SharedDataManager, SourceId,
};
use tokio_test::{assert_err, assert_ok};

// ========================
// Mock Implementations
// ========================

fn egs_record(edc: &str, egs: &str, rate: f64) -> EgsRecord {
    EgsRecord {
        date: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
        edc: edc.to_string(),
        egs: egs.to_string(),
        rate,
        term: Some(12),
        rate_type: Some("Fixed".to_string()),
        enrollment_fee: None,
        monthly_charge: None,
        early_term_fee_min: None,
        cancel_fee: None,
        source: EgsSource::WattBuy,
    }
}

struct MockEgsFetcher {
    calls: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
    delay: Duration,
}

impl MockEgsFetcher {
    fn new(calls: Arc<AtomicUsize>) -> Self {
        Self {
            calls,
            fail: Arc::new(AtomicBool::new(false)),
            delay: Duration::from_millis(50),
        }
    }
}

#[async_trait]
impl RawFetcher for MockEgsFetcher {
    fn source(&self) -> SourceId {
        SourceId::Egs
    }

    async fn fetch(&self, _params: &FetchParams) -> DataResult<RawSnapshot> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(DataError::FetchFailed {
                source_id: SourceId::Egs,
                cause: "mock outage".to_string(),
            });
        }
        Ok(RawSnapshot::Egs(vec![
            egs_record("PECO Energy", "Acme Energy", 8.0 + call as f64),
            egs_record("Penelec", "Bolt Power", 9.5 + call as f64),
        ]))
    }
}

struct MockPjmFetcher {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl RawFetcher for MockPjmFetcher {
    fn source(&self) -> SourceId {
        SourceId::Pjm
    }

    async fn fetch(&self, _params: &FetchParams) -> DataResult<RawSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawSnapshot::Pjm(vec![PjmRecord {
            date: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            zone: "PECO".to_string(),
            average_lmp: 30.0,
            lmp_cents_per_kwh: 3.0,
        }]))
    }
}

/// Registry that counts transform invocations, delegating to the builtins.
fn counting_registry(derivation_calls: Arc<AtomicUsize>) -> DerivationRegistry {
    let inner = Arc::new(DerivationRegistry::builtin());
    let mut registry = DerivationRegistry::new();
    for (source, consumer) in BUILTIN_PAIRS {
        let inner = Arc::clone(&inner);
        let calls = Arc::clone(&derivation_calls);
        registry.register(
            source,
            consumer,
            Arc::new(move |snapshot, params| {
                calls.fetch_add(1, Ordering::SeqCst);
                inner.derive(source, consumer, snapshot, params)
            }),
        );
    }
    registry
}

fn test_cache_config() -> CacheConfig {
    CacheConfig {
        egs_ttl_secs: 60,
        pjm_ttl_secs: 60,
        ptc_ttl_secs: 60,
        derived_ttl_secs: 60,
        failure_cooldown_secs: 5,
        ..CacheConfig::default()
    }
}

struct Harness {
    manager: Arc<SharedDataManager>,
    fetch_calls: Arc<AtomicUsize>,
    derivation_calls: Arc<AtomicUsize>,
    fail_fetch: Arc<AtomicBool>,
}

fn harness() -> Harness {
    let fetch_calls = Arc::new(AtomicUsize::new(0));
    let derivation_calls = Arc::new(AtomicUsize::new(0));
    let egs = MockEgsFetcher::new(Arc::clone(&fetch_calls));
    let fail_fetch = Arc::clone(&egs.fail);

    let manager = SharedDataManager::builder()
        .with_fetcher(Arc::new(egs))
        .with_fetcher(Arc::new(MockPjmFetcher {
            calls: Arc::new(AtomicUsize::new(0)),
        }))
        .with_registry(counting_registry(Arc::clone(&derivation_calls)))
        .with_config(test_cache_config())
        .build()
        .expect("wiring must verify");

    Harness {
        manager: Arc::new(manager),
        fetch_calls,
        derivation_calls,
        fail_fetch,
    }
}

// ========================
// Scenarios
// ========================

/// Three consumers request EGS-derived data within one validity window,
/// overlapping in time: exactly one raw fetch, three distinct derivations,
/// three consumer-specific payloads.
#[tokio::test(start_paused = true)]
async fn overlapping_consumers_share_one_fetch() {
    let h = harness();

    let future_task = {
        let manager = Arc::clone(&h.manager);
        tokio::spawn(async move { manager.egs_for_future(None).await })
    };
    let ptc_task = {
        let manager = Arc::clone(&h.manager);
        tokio::spawn(async move { manager.egs_for_ptc(None, false).await })
    };
    let fees_task = {
        let manager = Arc::clone(&h.manager);
        tokio::spawn(async move { manager.egs_for_fees(None).await })
    };

    let future_view = future_task.await.unwrap().unwrap();
    let ptc_view = ptc_task.await.unwrap().unwrap();
    let fees_view = fees_task.await.unwrap().unwrap();

    assert_eq!(h.fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.derivation_calls.load(Ordering::SeqCst), 3);

    // Consumer-specific shapes, all from the same snapshot.
    let DerivedView::RateSeries(future_points) = future_view.as_ref() else {
        panic!("future module expects a rate series");
    };
    assert!(future_points.iter().all(|p| p.egs.is_some()));

    let DerivedView::RateSeries(ptc_points) = ptc_view.as_ref() else {
        panic!("ptc module expects a rate series");
    };
    assert!(ptc_points.iter().all(|p| p.egs.is_none()));

    assert!(matches!(fees_view.as_ref(), DerivedView::FeeTable(_)));
}

/// Repeated identical requests inside the window cost nothing extra.
#[tokio::test(start_paused = true)]
async fn repeat_requests_hit_the_derived_cache() {
    let h = harness();

    let first = h.manager.egs_for_future(None).await.unwrap();
    let second = h.manager.egs_for_future(None).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second), "same cached allocation");
    assert_eq!(h.fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.derivation_calls.load(Ordering::SeqCst), 1);
}

/// Derived views are keyed per consumer: A's cache entry is never handed
/// to B, even though both derive from the same snapshot.
#[tokio::test(start_paused = true)]
async fn derivation_isolation_between_consumers() {
    let h = harness();

    let future_view = h.manager.egs_for_future(None).await.unwrap();
    let fees_view = h.manager.egs_for_fees(None).await.unwrap();

    assert_eq!(h.fetch_calls.load(Ordering::SeqCst), 1);
    assert_ne!(future_view.as_ref(), fees_view.as_ref());

    // EDC-filtered and unfiltered requests are distinct keys too.
    let filtered = h
        .manager
        .egs_for_future(Some("Penelec".to_string()))
        .await
        .unwrap();
    let DerivedView::RateSeries(points) = filtered.as_ref() else {
        panic!("expected a rate series");
    };
    assert!(points.iter().all(|p| p.edc == "Penelec"));
}

/// `force_refresh` followed by two concurrent requests for the same key:
/// exactly one new fetch, both callers see the new value.
#[tokio::test(start_paused = true)]
async fn force_refresh_then_concurrent_requests() {
    let h = harness();
    h.manager.egs_for_future(None).await.unwrap();
    assert_eq!(h.fetch_calls.load(Ordering::SeqCst), 1);

    h.manager.force_refresh().await;

    let a = {
        let manager = Arc::clone(&h.manager);
        tokio::spawn(async move { manager.egs_for_future(None).await })
    };
    let b = {
        let manager = Arc::clone(&h.manager);
        tokio::spawn(async move { manager.egs_for_future(None).await })
    };
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_eq!(h.fetch_calls.load(Ordering::SeqCst), 2);
    assert_eq!(a.as_ref(), b.as_ref());
}

/// After invalidating a source, the next request never returns the
/// pre-invalidation value.
#[tokio::test(start_paused = true)]
async fn invalidation_is_observable() {
    let h = harness();

    let before = h.manager.egs_for_future(None).await.unwrap();
    h.manager.invalidate_source(SourceId::Egs).await;
    let after = h.manager.egs_for_future(None).await.unwrap();

    // The mock bakes the call counter into its rates, so a refetch is
    // visible in the payload.
    assert_ne!(before.as_ref(), after.as_ref());
    assert_eq!(h.fetch_calls.load(Ordering::SeqCst), 2);
}

/// A failed fetch is never cached permanently: the cooldown holds the
/// error, and the first request after the cooldown retries.
#[tokio::test(start_paused = true)]
async fn failures_cool_down_then_retry() {
    let h = harness();
    h.fail_fetch.store(true, Ordering::SeqCst);

    assert_err!(h.manager.egs_for_future(None).await);
    assert_eq!(h.fetch_calls.load(Ordering::SeqCst), 1);

    // Inside the cooldown: same error, no second fetch.
    assert_err!(h.manager.egs_for_future(None).await);
    assert_eq!(h.fetch_calls.load(Ordering::SeqCst), 1);

    h.fail_fetch.store(false, Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(6)).await;

    let view = assert_ok!(h.manager.egs_for_future(None).await);
    assert!(!view.is_empty());
    assert_eq!(h.fetch_calls.load(Ordering::SeqCst), 2);
}

/// Values observed for a key never move backwards in creation time: after
/// the TTL expires, every caller sees the refreshed snapshot.
#[tokio::test(start_paused = true)]
async fn freshness_is_monotonic_across_expiry() {
    let h = harness();

    let first = h.manager.egs_for_future(None).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;
    let second = h.manager.egs_for_future(None).await.unwrap();
    let third = h.manager.egs_for_future(None).await.unwrap();

    assert_ne!(first.as_ref(), second.as_ref());
    assert!(Arc::ptr_eq(&second, &third), "no regression to older data");
    assert_eq!(h.fetch_calls.load(Ordering::SeqCst), 2);
}

/// PJM raw snapshots are cached independently of EGS; invalidating one
/// source leaves the other warm.
#[tokio::test(start_paused = true)]
async fn sources_are_isolated() {
    let h = harness();

    h.manager.egs_for_future(None).await.unwrap();
    h.manager
        .pjm_for_module(Some("PECO Energy".to_string()), None)
        .await
        .unwrap();
    let (raw, derived) = h.manager.entry_counts().await;
    assert_eq!((raw, derived), (2, 2));

    h.manager.invalidate_source(SourceId::Egs).await;
    let (raw, derived) = h.manager.entry_counts().await;
    assert_eq!((raw, derived), (1, 1));
}
