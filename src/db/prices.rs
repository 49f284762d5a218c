use std::collections::HashMap;

use async_trait::async_trait;

use crate::db::models::{to_epoch_ms, RealizedPriceRow};
use crate::error::{AppError, Result};
use crate::state::RealizedPriceSource;
use crate::types::{PricePath, PricePoint, Timestamp};

/// Reads the `realized_prices` table filled by the price observation process.
pub struct SqlitePriceSource {
    pool: sqlx::SqlitePool,
}

impl SqlitePriceSource {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert one observation, the way the observation process writes them.
    #[cfg(test)]
    pub async fn record(&self, asset: &str, point: PricePoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO realized_prices (asset, time_ms, price) VALUES (?, ?, ?)
            ON CONFLICT(asset, time_ms) DO UPDATE SET price = excluded.price
            "#,
        )
        .bind(asset)
        .bind(to_epoch_ms(point.time))
        .bind(point.price)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RealizedPriceSource for SqlitePriceSource {
    async fn realized_path(&self, asset: &str, times: &[Timestamp]) -> Result<PricePath> {
        let (Some(first), Some(last)) = (times.first(), times.last()) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query_as::<_, RealizedPriceRow>(
            r#"
            SELECT time_ms, price FROM realized_prices
            WHERE asset = ? AND time_ms BETWEEN ? AND ?
            "#,
        )
        .bind(asset)
        .bind(to_epoch_ms(*first))
        .bind(to_epoch_ms(*last))
        .fetch_all(&self.pool)
        .await?;

        let by_time: HashMap<i64, f64> = rows.into_iter().map(|r| (r.time_ms, r.price)).collect();

        let mut missing = 0usize;
        let mut path = Vec::with_capacity(times.len());
        for &time in times {
            match by_time.get(&to_epoch_ms(time)) {
                Some(&price) => path.push(PricePoint::new(time, price)),
                None => missing += 1,
            }
        }
        if missing > 0 {
            return Err(AppError::PriceUnavailable(format!(
                "{asset}: {missing} of {} points missing between {} and {}",
                times.len(),
                first.to_rfc3339(),
                last.to_rfc3339()
            )));
        }
        Ok(path)
    }
}
