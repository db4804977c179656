//! EGS raw fetcher: retail offers from both upstream views.
//!
//! The WattBuy and OCA plan views publish the same core columns but
//! different fee columns. Both are fetched in one snapshot, with each row
//! tagged by its origin so derivations can apply source-specific rules.

use async_trait::async_trait;
use sqlx::{MySqlPool, Row};
use tracing::debug;

use crate::domain::errors::DataResult;
use crate::domain::models::edc::normalize_edc;
use crate::domain::models::{EgsRecord, EgsSource, FetchParams, RawSnapshot, SourceId};
use crate::domain::ports::RawFetcher;

use super::{fetch_error, month_start, MAX_RATE_CENTS_PER_KWH};

const WATTBUY_QUERY: &str = r"
    SELECT CAST(YEAR(date) AS SIGNED) AS year,
           CAST(MONTH(date) AS SIGNED) AS month,
           edc,
           egs,
           CAST(rate AS DOUBLE) AS rate,
           CAST(term AS SIGNED) AS term,
           rate_type,
           CAST(enrollment_fee AS DOUBLE) AS enrollment_fee,
           CAST(monthly_charge AS DOUBLE) AS monthly_charge,
           CAST(early_term_fee_min AS DOUBLE) AS early_term_fee_min
    FROM v_wattbuy_simple
    WHERE edc IS NOT NULL AND egs IS NOT NULL AND rate IS NOT NULL
      AND YEAR(date) >= ?
";

const OCAPLANS_QUERY: &str = r"
    SELECT CAST(YEAR(date) AS SIGNED) AS year,
           CAST(MONTH(date) AS SIGNED) AS month,
           edc,
           egs,
           CAST(rate AS DOUBLE) AS rate,
           CAST(term AS SIGNED) AS term,
           rate_type,
           CAST(cancel_fee AS DOUBLE) AS cancel_fee
    FROM v_ocaplans_simple
    WHERE edc IS NOT NULL AND egs IS NOT NULL AND rate IS NOT NULL
      AND YEAR(date) >= ?
";

pub struct MySqlEgsFetcher {
    pool: MySqlPool,
}

impl MySqlEgsFetcher {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_view(
        &self,
        query: &str,
        min_year: i32,
        source: EgsSource,
    ) -> DataResult<Vec<EgsRecord>> {
        let rows = sqlx::query(query)
            .bind(min_year)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| fetch_error(SourceId::Egs, &e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let year: i64 = row.try_get("year").map_err(|e| fetch_error(SourceId::Egs, &e))?;
            let month: i64 = row
                .try_get("month")
                .map_err(|e| fetch_error(SourceId::Egs, &e))?;
            let edc: String = row.try_get("edc").map_err(|e| fetch_error(SourceId::Egs, &e))?;
            let egs: String = row.try_get("egs").map_err(|e| fetch_error(SourceId::Egs, &e))?;
            let rate: f64 = row.try_get("rate").map_err(|e| fetch_error(SourceId::Egs, &e))?;

            if rate <= 0.0 || rate > MAX_RATE_CENTS_PER_KWH {
                continue;
            }

            let (enrollment_fee, monthly_charge, early_term_fee_min, cancel_fee) = match source {
                EgsSource::WattBuy => (
                    row.try_get("enrollment_fee")
                        .map_err(|e| fetch_error(SourceId::Egs, &e))?,
                    row.try_get("monthly_charge")
                        .map_err(|e| fetch_error(SourceId::Egs, &e))?,
                    row.try_get("early_term_fee_min")
                        .map_err(|e| fetch_error(SourceId::Egs, &e))?,
                    None,
                ),
                EgsSource::Ocap => (
                    None,
                    None,
                    None,
                    row.try_get("cancel_fee")
                        .map_err(|e| fetch_error(SourceId::Egs, &e))?,
                ),
            };

            records.push(EgsRecord {
                date: month_start(SourceId::Egs, year, month)?,
                edc: normalize_edc(&edc).to_string(),
                egs,
                rate,
                term: row.try_get("term").map_err(|e| fetch_error(SourceId::Egs, &e))?,
                rate_type: row
                    .try_get("rate_type")
                    .map_err(|e| fetch_error(SourceId::Egs, &e))?,
                enrollment_fee,
                monthly_charge,
                early_term_fee_min,
                cancel_fee,
                source,
            });
        }

        debug!(view = %source, rows = records.len(), "fetched EGS view");
        Ok(records)
    }
}

#[async_trait]
impl RawFetcher for MySqlEgsFetcher {
    fn source(&self) -> SourceId {
        SourceId::Egs
    }

    async fn fetch(&self, params: &FetchParams) -> DataResult<RawSnapshot> {
        let mut records = self
            .fetch_view(WATTBUY_QUERY, params.min_year, EgsSource::WattBuy)
            .await?;
        let ocap = self
            .fetch_view(OCAPLANS_QUERY, params.min_year, EgsSource::Ocap)
            .await?;
        records.extend(ocap);

        debug!(rows = records.len(), "fetched EGS snapshot");
        Ok(RawSnapshot::Egs(records))
    }
}
