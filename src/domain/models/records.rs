//! Payload types: raw snapshots and derived views.
//!
//! Snapshots and views are immutable once constructed. The stores hand them
//! out behind `Arc`, so consumers share a single allocation and derivations
//! only ever read their input.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which upstream view an EGS offer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EgsSource {
    WattBuy,
    Ocap,
}

impl EgsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WattBuy => "WattBuy",
            Self::Ocap => "OCAP",
        }
    }
}

impl std::fmt::Display for EgsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One EGS retail offer row (month granularity).
///
/// Fee columns differ between the two upstream views: WattBuy rows carry
/// enrollment/monthly/early-termination fees, OCA rows carry a cancel fee.
/// Absent columns stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgsRecord {
    pub date: NaiveDate,
    pub edc: String,
    pub egs: String,
    /// Offer rate in cents/kWh.
    pub rate: f64,
    /// Contract term in months, when published.
    pub term: Option<i64>,
    pub rate_type: Option<String>,
    pub enrollment_fee: Option<f64>,
    pub monthly_charge: Option<f64>,
    pub early_term_fee_min: Option<f64>,
    pub cancel_fee: Option<f64>,
    pub source: EgsSource,
}

/// One PJM zone/month average LMP row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PjmRecord {
    pub date: NaiveDate,
    pub zone: String,
    /// Monthly average LMP in $/MWh.
    pub average_lmp: f64,
    /// Same value converted to cents/kWh.
    pub lmp_cents_per_kwh: f64,
}

/// One price-to-compare rate period for an EDC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtcRecord {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub edc: String,
    /// Default-service rate in cents/kWh.
    pub rate: f64,
}

/// Immutable raw dataset snapshot, as returned by a fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawSnapshot {
    Egs(Vec<EgsRecord>),
    Pjm(Vec<PjmRecord>),
    Ptc(Vec<PtcRecord>),
}

impl RawSnapshot {
    /// Number of rows in the snapshot, whatever its shape.
    pub fn len(&self) -> usize {
        match self {
            Self::Egs(rows) => rows.len(),
            Self::Pjm(rows) => rows.len(),
            Self::Ptc(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One aggregated rate observation in a derived series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub date: NaiveDate,
    pub edc: String,
    /// Supplier, for per-EGS series; `None` for EDC-level aggregates.
    pub egs: Option<String>,
    /// Mean rate in cents/kWh over the grouped rows.
    pub avg_rate: f64,
    /// Label describing how the point was produced.
    pub source: String,
}

/// Immutable consumer-specific view derived from one raw snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DerivedView {
    /// Aggregated rate series (Future and PTC module shapes).
    RateSeries(Vec<RatePoint>),
    /// Per-offer fee table (Fees module shape; WattBuy rows only).
    FeeTable(Vec<EgsRecord>),
    /// Zone-filtered LMP series (PJM module shape).
    LmpSeries(Vec<PjmRecord>),
}

impl DerivedView {
    pub fn len(&self) -> usize {
        match self {
            Self::RateSeries(rows) => rows.len(),
            Self::FeeTable(rows) => rows.len(),
            Self::LmpSeries(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize the view for a presentation consumer.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn egs_source_labels_match_the_upstream_views() {
        assert_eq!(EgsSource::WattBuy.to_string(), "WattBuy");
        assert_eq!(EgsSource::Ocap.to_string(), "OCAP");
    }

    #[test]
    fn view_serializes_with_tagged_shape() {
        let view = DerivedView::RateSeries(vec![RatePoint {
            date: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            edc: "PECO Energy".to_string(),
            egs: None,
            avg_rate: 8.25,
            source: "Combined Average".to_string(),
        }]);

        let json = view.to_json().unwrap();
        assert!(json.contains("RateSeries"));
        assert!(json.contains("2020-06-01"));
        assert!(json.contains("Combined Average"));
    }
}
