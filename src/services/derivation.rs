//! Derivation registry: maps (source, consumer) pairs to pure transforms.
//!
//! A transform takes one raw snapshot plus derivation parameters and
//! produces the consumer-specific view. Transforms must be deterministic
//! and side-effect free; that is a documented precondition, not a runtime
//! check, and it is what makes caching their output sound.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Datelike;
use tracing::debug;

use crate::domain::errors::{DataError, DataResult};
use crate::domain::models::edc::edc_zone;
use crate::domain::models::{
    ConsumerId, DeriveParams, DerivedView, EgsRecord, EgsSource, PjmRecord, RatePoint,
    RawSnapshot, SourceId,
};

/// A registered transform from raw snapshot to derived view.
pub type Transform =
    Arc<dyn Fn(&RawSnapshot, &DeriveParams) -> DataResult<DerivedView> + Send + Sync>;

/// The (source, consumer) pairs the stock deployment wires up.
pub const BUILTIN_PAIRS: [(SourceId, ConsumerId); 4] = [
    (SourceId::Egs, ConsumerId::Future),
    (SourceId::Egs, ConsumerId::Ptc),
    (SourceId::Egs, ConsumerId::Fees),
    (SourceId::Pjm, ConsumerId::Pjm),
];

/// Lookup table of transforms, keyed by (source, consumer).
///
/// Replaces per-pair convenience functions with one registry that the
/// façade iterates, so adding a consumer means one `register` call.
#[derive(Default)]
pub struct DerivationRegistry {
    transforms: HashMap<(SourceId, ConsumerId), Transform>,
}

impl DerivationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the stock transforms for the four consumer
    /// modules.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SourceId::Egs, ConsumerId::Future, Arc::new(derive_egs_future));
        registry.register(SourceId::Egs, ConsumerId::Ptc, Arc::new(derive_egs_ptc));
        registry.register(SourceId::Egs, ConsumerId::Fees, Arc::new(derive_egs_fees));
        registry.register(SourceId::Pjm, ConsumerId::Pjm, Arc::new(derive_pjm));
        registry
    }

    /// Associate a transform with a (source, consumer) pair, replacing any
    /// previous registration.
    pub fn register(&mut self, source: SourceId, consumer: ConsumerId, transform: Transform) {
        debug!(%source, %consumer, "registering derivation");
        self.transforms.insert((source, consumer), transform);
    }

    /// Whether a transform is registered for the pair.
    pub fn is_registered(&self, source: SourceId, consumer: ConsumerId) -> bool {
        self.transforms.contains_key(&(source, consumer))
    }

    /// Apply the registered transform for the pair.
    pub fn derive(
        &self,
        source: SourceId,
        consumer: ConsumerId,
        snapshot: &RawSnapshot,
        params: &DeriveParams,
    ) -> DataResult<DerivedView> {
        let transform = self
            .transforms
            .get(&(source, consumer))
            .ok_or(DataError::UnregisteredDerivation {
                source_id: source,
                consumer,
            })?;
        transform(snapshot, params)
    }

    /// Verify every pair in `pairs` has a transform. Called at wiring time
    /// so a missing derivation fails startup instead of a live request.
    pub fn verify_wiring(&self, pairs: &[(SourceId, ConsumerId)]) -> DataResult<()> {
        for &(source, consumer) in pairs {
            if !self.is_registered(source, consumer) {
                return Err(DataError::UnregisteredDerivation {
                    source_id: source,
                    consumer,
                });
            }
        }
        Ok(())
    }
}

fn egs_rows(snapshot: &RawSnapshot, consumer: ConsumerId) -> DataResult<&[EgsRecord]> {
    match snapshot {
        RawSnapshot::Egs(rows) => Ok(rows),
        other => Err(DataError::DerivationFailed {
            source_id: SourceId::Egs,
            consumer,
            cause: format!("expected EGS snapshot, got {} rows of another shape", other.len()),
        }),
    }
}

fn edc_matches(record_edc: &str, filter: Option<&str>) -> bool {
    filter.is_none_or(|edc| record_edc == edc)
}

fn none_or_zero(value: Option<f64>) -> bool {
    value.is_none_or(|v| v == 0.0)
}

/// EGS view for the Future module: 2017-2022 offers, grouped by
/// (date, EDC, supplier) with the mean rate per group.
fn derive_egs_future(snapshot: &RawSnapshot, params: &DeriveParams) -> DataResult<DerivedView> {
    let rows = egs_rows(snapshot, ConsumerId::Future)?;

    let mut groups: BTreeMap<(chrono::NaiveDate, String, String), (f64, u32)> = BTreeMap::new();
    for row in rows {
        if !(2017..=2022).contains(&row.date.year()) {
            continue;
        }
        if !edc_matches(&row.edc, params.edc.as_deref()) {
            continue;
        }
        let entry = groups
            .entry((row.date, row.edc.clone(), row.egs.clone()))
            .or_insert((0.0, 0));
        entry.0 += row.rate;
        entry.1 += 1;
    }

    let points = groups
        .into_iter()
        .map(|((date, edc, egs), (sum, count))| RatePoint {
            date,
            edc,
            egs: Some(egs),
            avg_rate: sum / f64::from(count),
            source: "Combined".to_string(),
        })
        .collect();
    Ok(DerivedView::RateSeries(points))
}

/// Whether an offer counts as conforming: 12-month fixed rate with no fees.
///
/// The two upstream views publish different fee columns, so "no fees" is
/// source-specific: WattBuy rows must have no enrollment fee, monthly
/// charge, or early-termination fee; OCA rows must have no cancel fee.
fn is_conforming(row: &EgsRecord) -> bool {
    if row.term != Some(12) {
        return false;
    }
    let fixed = row
        .rate_type
        .as_deref()
        .is_some_and(|t| t.to_lowercase().contains("fixed"));
    if !fixed {
        return false;
    }
    match row.source {
        EgsSource::WattBuy => {
            none_or_zero(row.enrollment_fee)
                && none_or_zero(row.monthly_charge)
                && none_or_zero(row.early_term_fee_min)
        }
        EgsSource::Ocap => row.cancel_fee.is_none(),
    }
}

/// EGS view for the PTC module: EDC-level mean rates, optionally restricted
/// to conforming offers.
fn derive_egs_ptc(snapshot: &RawSnapshot, params: &DeriveParams) -> DataResult<DerivedView> {
    let rows = egs_rows(snapshot, ConsumerId::Ptc)?;

    let label = if params.conform {
        "Conformed EGS"
    } else {
        "Combined Average"
    };

    let mut groups: BTreeMap<(chrono::NaiveDate, String), (f64, u32)> = BTreeMap::new();
    for row in rows {
        if !edc_matches(&row.edc, params.edc.as_deref()) {
            continue;
        }
        if params.conform && !is_conforming(row) {
            continue;
        }
        let entry = groups.entry((row.date, row.edc.clone())).or_insert((0.0, 0));
        entry.0 += row.rate;
        entry.1 += 1;
    }

    let points = groups
        .into_iter()
        .map(|((date, edc), (sum, count))| RatePoint {
            date,
            edc,
            egs: None,
            avg_rate: sum / f64::from(count),
            source: label.to_string(),
        })
        .collect();
    Ok(DerivedView::RateSeries(points))
}

/// EGS view for the Fees module: WattBuy offers only, with every fee column
/// intact. The OCA view carries no signup-fee detail, so it is excluded.
fn derive_egs_fees(snapshot: &RawSnapshot, params: &DeriveParams) -> DataResult<DerivedView> {
    let rows = egs_rows(snapshot, ConsumerId::Fees)?;

    let table = rows
        .iter()
        .filter(|row| row.source == EgsSource::WattBuy)
        .filter(|row| edc_matches(&row.edc, params.edc.as_deref()))
        .cloned()
        .collect();
    Ok(DerivedView::FeeTable(table))
}

/// PJM view: LMP series filtered to the requesting EDC's zone and an
/// optional date range. An EDC with no known zone yields an empty view.
fn derive_pjm(snapshot: &RawSnapshot, params: &DeriveParams) -> DataResult<DerivedView> {
    let rows: &[PjmRecord] = match snapshot {
        RawSnapshot::Pjm(rows) => rows,
        other => {
            return Err(DataError::DerivationFailed {
                source_id: SourceId::Pjm,
                consumer: ConsumerId::Pjm,
                cause: format!(
                    "expected PJM snapshot, got {} rows of another shape",
                    other.len()
                ),
            })
        }
    };

    let zone = match params.edc.as_deref() {
        Some(edc) => match edc_zone(edc) {
            Some(zone) => Some(zone),
            None => return Ok(DerivedView::LmpSeries(Vec::new())),
        },
        None => None,
    };

    let series = rows
        .iter()
        .filter(|row| zone.is_none_or(|z| row.zone == z))
        .filter(|row| {
            params
                .date_range
                .is_none_or(|(start, end)| row.date >= start && row.date <= end)
        })
        .cloned()
        .collect();
    Ok(DerivedView::LmpSeries(series))
}
