//! PTC raw fetcher: default-service rate periods per EDC.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{MySqlPool, Row};
use tracing::debug;

use crate::domain::errors::DataResult;
use crate::domain::models::edc::normalize_edc;
use crate::domain::models::{FetchParams, PtcRecord, RawSnapshot, SourceId};
use crate::domain::ports::RawFetcher;

use super::{fetch_error, MAX_RATE_CENTS_PER_KWH};

const PTC_QUERY: &str = r"
    SELECT CAST(start_date AS DATE) AS start_date,
           CAST(end_date AS DATE) AS end_date,
           edc,
           CAST(rate AS DOUBLE) AS rate
    FROM v_ptc_agg
    WHERE edc IS NOT NULL AND rate IS NOT NULL
      AND start_date IS NOT NULL AND end_date IS NOT NULL
      AND YEAR(start_date) >= ?
    ORDER BY edc, start_date
";

pub struct MySqlPtcFetcher {
    pool: MySqlPool,
}

impl MySqlPtcFetcher {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RawFetcher for MySqlPtcFetcher {
    fn source(&self) -> SourceId {
        SourceId::Ptc
    }

    async fn fetch(&self, params: &FetchParams) -> DataResult<RawSnapshot> {
        let rows = sqlx::query(PTC_QUERY)
            .bind(params.min_year)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| fetch_error(SourceId::Ptc, &e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let start_date: NaiveDate = row
                .try_get("start_date")
                .map_err(|e| fetch_error(SourceId::Ptc, &e))?;
            let end_date: NaiveDate = row
                .try_get("end_date")
                .map_err(|e| fetch_error(SourceId::Ptc, &e))?;
            let edc: String = row.try_get("edc").map_err(|e| fetch_error(SourceId::Ptc, &e))?;
            let rate: f64 = row.try_get("rate").map_err(|e| fetch_error(SourceId::Ptc, &e))?;

            if rate <= 0.0 || rate > MAX_RATE_CENTS_PER_KWH {
                continue;
            }

            records.push(PtcRecord {
                start_date,
                end_date,
                edc: normalize_edc(&edc).to_string(),
                rate,
            });
        }

        debug!(rows = records.len(), "fetched PTC snapshot");
        Ok(RawSnapshot::Ptc(records))
    }
}
