use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::{debug, warn};

use crate::db::models::{to_epoch_ms, ForecastRow};
use crate::error::Result;
use crate::state::{validate_paths, ForecastStore};
use crate::types::{ForecastRecord, PricePath, Timestamp};

/// Durable forecast log in the `forecasts` table.
///
/// The table is also the hand-off point for the external ingestion process:
/// anything it appends through this type is visible to the evaluator.
pub struct SqliteForecastStore {
    pool: sqlx::SqlitePool,
    cadence: Duration,
}

impl SqliteForecastStore {
    pub fn new(pool: sqlx::SqlitePool, cadence: Duration) -> Self {
        Self { pool, cadence }
    }
}

#[async_trait]
impl ForecastStore for SqliteForecastStore {
    async fn append(
        &self,
        participant_id: &str,
        submitted_at: Timestamp,
        paths: Vec<PricePath>,
    ) -> Result<Arc<ForecastRecord>> {
        validate_paths(&paths, self.cadence)?;

        let paths_json = serde_json::to_string(&paths)?;
        let path_len = paths[0].len() as i64;
        let ensemble_size = paths.len() as i64;

        // Single INSERT in its own transaction: the row is visible whole or not at all.
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO forecasts (participant_id, submitted_at, path_len, ensemble_size, paths_json)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(participant_id)
        .bind(to_epoch_ms(submitted_at))
        .bind(path_len)
        .bind(ensemble_size)
        .bind(&paths_json)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(participant_id, seq = id, ensemble_size, path_len, "forecast appended");

        Ok(Arc::new(ForecastRecord {
            seq: id as u64,
            participant_id: participant_id.to_string(),
            submitted_at,
            paths,
        }))
    }

    async fn records_for(&self, participant_id: &str) -> Result<Vec<Arc<ForecastRecord>>> {
        let rows = sqlx::query_as::<_, ForecastRow>(
            r#"
            SELECT id, participant_id, submitted_at, path_len, ensemble_size, paths_json
            FROM forecasts
            WHERE participant_id = ?
            ORDER BY id
            "#,
        )
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;

        // One unreadable row fails the whole read: a partial log could hide the newest forecast.
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            let record = row.into_record().inspect_err(|e| {
                warn!(participant_id, row_id = id, "unreadable forecast row: {e}");
            })?;
            records.push(Arc::new(record));
        }
        Ok(records)
    }

    async fn participants(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT participant_id FROM forecasts ORDER BY participant_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
