//! Cache key types.
//!
//! Keys are plain data: deterministic, hashable, and cheap to clone. Two
//! logically identical requests must hash and compare equal, since the
//! memoization store relies on key equality for both lookup and
//! single-flight de-duplication.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier for a raw data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// EGS retail offers (WattBuy and OCA plan views).
    Egs,
    /// PJM locational marginal prices.
    Pjm,
    /// Price-to-compare default service rates.
    Ptc,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Egs => "egs",
            Self::Pjm => "pjm",
            Self::Ptc => "ptc",
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier for a consuming module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerId {
    /// Future-pricing analysis module.
    Future,
    /// PTC comparison module.
    Ptc,
    /// Fee analysis module.
    Fees,
    /// PJM LMP module.
    Pjm,
}

impl ConsumerId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Future => "future",
            Self::Ptc => "ptc",
            Self::Fees => "fees",
            Self::Pjm => "pjm",
        }
    }
}

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for a raw fetch.
///
/// The upstream views are queried in full from a floor year onward; the
/// floor is the only knob a raw fetch takes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchParams {
    /// Earliest year of data to fetch.
    pub min_year: i32,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self { min_year: 2010 }
    }
}

/// Parameters for a derivation.
///
/// All fields participate in the derived cache key, so two requests that
/// differ in any filter produce distinct cached views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeriveParams {
    /// Restrict the view to a single EDC (electric distribution company).
    pub edc: Option<String>,
    /// Keep only conforming offers (12-month fixed-rate, no fees).
    pub conform: bool,
    /// Restrict the view to an inclusive date range.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl DeriveParams {
    /// Filter by EDC only.
    pub fn for_edc(edc: impl Into<String>) -> Self {
        Self {
            edc: Some(edc.into()),
            ..Self::default()
        }
    }
}

/// Key for a cached raw snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawKey {
    pub source: SourceId,
    pub params: FetchParams,
}

/// Key for a cached derived view.
///
/// Carries the raw key components so that invalidating a source can sweep
/// every view derived from it (one-directional dependency link).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivedKey {
    pub source: SourceId,
    pub consumer: ConsumerId,
    pub fetch: FetchParams,
    pub derive: DeriveParams,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn logically_equal_keys_are_equal() {
        let a = DerivedKey {
            source: SourceId::Egs,
            consumer: ConsumerId::Future,
            fetch: FetchParams::default(),
            derive: DeriveParams::for_edc("PECO Energy"),
        };
        let b = DerivedKey {
            source: SourceId::Egs,
            consumer: ConsumerId::Future,
            fetch: FetchParams::default(),
            derive: DeriveParams::for_edc("PECO Energy".to_string()),
        };
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn consumer_distinguishes_keys() {
        let base = DerivedKey {
            source: SourceId::Egs,
            consumer: ConsumerId::Future,
            fetch: FetchParams::default(),
            derive: DeriveParams::default(),
        };
        let other = DerivedKey {
            consumer: ConsumerId::Fees,
            ..base.clone()
        };
        assert_ne!(base, other);
    }
}
