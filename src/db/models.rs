//! Row types for the tables in `migrations/`.
//! Used by sqlx for typed queries.

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::types::{ForecastRecord, LedgerRow, PricePath, Timestamp};

#[derive(Debug, sqlx::FromRow)]
pub struct ForecastRow {
    pub id: i64,
    pub participant_id: String,
    pub submitted_at: i64,
    pub path_len: i64,
    pub ensemble_size: i64,
    pub paths_json: String,
}

impl ForecastRow {
    pub fn into_record(self) -> Result<ForecastRecord> {
        let paths: Vec<PricePath> = serde_json::from_str(&self.paths_json)?;
        if paths.len() as i64 != self.ensemble_size
            || paths.first().map(Vec::len).unwrap_or(0) as i64 != self.path_len
        {
            return Err(AppError::InvalidInput(format!(
                "forecast row {} does not match its recorded shape",
                self.id
            )));
        }
        Ok(ForecastRecord {
            seq: self.id as u64,
            participant_id: self.participant_id,
            submitted_at: from_epoch_ms(self.submitted_at)?,
            paths,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct RealizedPriceRow {
    pub time_ms: i64,
    pub price: f64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ScoreLedgerRow {
    pub participant_id: String,
    pub day: String,
    pub evaluated_at: i64,
    pub overall_total: f64,
    pub rows_json: String,
}

impl ScoreLedgerRow {
    pub fn rows(&self) -> Result<Vec<LedgerRow>> {
        Ok(serde_json::from_str(&self.rows_json)?)
    }
}

pub fn to_epoch_ms(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

pub fn from_epoch_ms(ms: i64) -> Result<Timestamp> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| AppError::InvalidInput(format!("timestamp {ms}ms out of range")))
}
