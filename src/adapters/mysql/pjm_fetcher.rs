//! PJM raw fetcher: monthly per-zone average locational marginal prices.

use async_trait::async_trait;
use sqlx::{MySqlPool, Row};
use tracing::debug;

use crate::domain::errors::DataResult;
use crate::domain::models::{FetchParams, PjmRecord, RawSnapshot, SourceId};
use crate::domain::ports::RawFetcher;

use super::{fetch_error, month_start, MAX_RATE_CENTS_PER_KWH};

/// $/MWh to cents/kWh.
const LMP_TO_CENTS: f64 = 0.1;

const PJM_QUERY: &str = r"
    SELECT CAST(YEAR(date) AS SIGNED) AS year,
           CAST(MONTH(date) AS SIGNED) AS month,
           zone,
           CAST(AVG(average_lmp) AS DOUBLE) AS average_lmp
    FROM PJM_daily
    WHERE YEAR(date) >= ?
    GROUP BY YEAR(date), MONTH(date), zone
    ORDER BY year, month, zone
";

pub struct MySqlPjmFetcher {
    pool: MySqlPool,
}

impl MySqlPjmFetcher {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RawFetcher for MySqlPjmFetcher {
    fn source(&self) -> SourceId {
        SourceId::Pjm
    }

    async fn fetch(&self, params: &FetchParams) -> DataResult<RawSnapshot> {
        let rows = sqlx::query(PJM_QUERY)
            .bind(params.min_year)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| fetch_error(SourceId::Pjm, &e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let year: i64 = row.try_get("year").map_err(|e| fetch_error(SourceId::Pjm, &e))?;
            let month: i64 = row
                .try_get("month")
                .map_err(|e| fetch_error(SourceId::Pjm, &e))?;
            let zone: String = row.try_get("zone").map_err(|e| fetch_error(SourceId::Pjm, &e))?;
            let average_lmp: f64 = row
                .try_get("average_lmp")
                .map_err(|e| fetch_error(SourceId::Pjm, &e))?;

            let lmp_cents_per_kwh = average_lmp * LMP_TO_CENTS;
            if lmp_cents_per_kwh <= 0.0 || lmp_cents_per_kwh > MAX_RATE_CENTS_PER_KWH {
                continue;
            }

            records.push(PjmRecord {
                date: month_start(SourceId::Pjm, year, month)?,
                zone,
                average_lmp,
                lmp_cents_per_kwh,
            });
        }

        debug!(rows = records.len(), "fetched PJM snapshot");
        Ok(RawSnapshot::Pjm(records))
    }
}
