//! MySQL-backed raw fetchers.
//!
//! One fetcher per source, each implementing the [`RawFetcher`] port over
//! the upstream reporting views. Fetchers sanitize at ingest: EDC names are
//! normalized and rows with non-positive or outlier rates are dropped, so
//! downstream derivations never see them.
//!
//! [`RawFetcher`]: crate::domain::ports::RawFetcher

pub mod connection;
pub mod egs_fetcher;
pub mod pjm_fetcher;
pub mod ptc_fetcher;

pub use connection::{create_pool, test_connection, ConnectionError, PoolConfig};
pub use egs_fetcher::MySqlEgsFetcher;
pub use pjm_fetcher::MySqlPjmFetcher;
pub use ptc_fetcher::MySqlPtcFetcher;

use chrono::NaiveDate;

use crate::domain::errors::{DataError, DataResult};
use crate::domain::models::SourceId;

/// Upper bound for plausible retail/wholesale rates in cents/kWh; rows
/// above it are treated as data errors and dropped.
pub(crate) const MAX_RATE_CENTS_PER_KWH: f64 = 50.0;

pub(crate) fn fetch_error(source: SourceId, err: &sqlx::Error) -> DataError {
    DataError::FetchFailed {
        source_id: source,
        cause: err.to_string(),
    }
}

/// First day of the month for a (year, month) pair out of the database.
pub(crate) fn month_start(source: SourceId, year: i64, month: i64) -> DataResult<NaiveDate> {
    let year = i32::try_from(year).ok();
    let month = u32::try_from(month).ok();
    year.zip(month)
        .and_then(|(y, m)| NaiveDate::from_ymd_opt(y, m, 1))
        .ok_or_else(|| DataError::FetchFailed {
            source_id: source,
            cause: format!("invalid year/month in result set: {year:?}-{month:?}"),
        })
}
