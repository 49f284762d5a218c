use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::api::health::HealthState;
use crate::db::models::to_epoch_ms;
use crate::error::Result;
use crate::report::ReportSink;
use crate::types::{ScoreLedger, ScoreSummary};

/// One participant's result for one evaluation cycle.
#[derive(Debug, Clone)]
pub struct LedgerMsg {
    pub ledger: ScoreLedger,
    pub summary: ScoreSummary,
}

/// Stores ledgers in `score_ledgers`, keyed by (participant, day).
pub struct SqliteReportSink {
    pool: sqlx::SqlitePool,
}

impl SqliteReportSink {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportSink for SqliteReportSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn write_ledger(&self, ledger: &ScoreLedger, summary: &ScoreSummary) -> Result<()> {
        let day = ledger.day().format("%Y-%m-%d").to_string();
        let rows_json = serde_json::to_string(&ledger.rows)?;

        sqlx::query(
            r#"
            INSERT INTO score_ledgers (participant_id, day, evaluated_at, overall_total, rows_json)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(participant_id, day) DO UPDATE SET
                evaluated_at = excluded.evaluated_at,
                overall_total = excluded.overall_total,
                rows_json = excluded.rows_json
            "#,
        )
        .bind(&ledger.participant_id)
        .bind(&day)
        .bind(to_epoch_ms(ledger.evaluated_at))
        .bind(summary.overall_total)
        .bind(&rows_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Receives ledgers from the evaluator and hands each to every sink.
/// Runs as a dedicated background task; being the only writer, it keeps
/// writes for one participant/day in arrival order.
pub struct LedgerWriter {
    sinks: Vec<Arc<dyn ReportSink>>,
    ledger_rx: mpsc::Receiver<LedgerMsg>,
    health: Arc<HealthState>,
}

impl LedgerWriter {
    pub fn new(
        sinks: Vec<Arc<dyn ReportSink>>,
        ledger_rx: mpsc::Receiver<LedgerMsg>,
        health: Arc<HealthState>,
    ) -> Self {
        Self { sinks, ledger_rx, health }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.ledger_rx.recv().await {
            self.write(&msg).await;
            self.health.dec_write_queue_pending();
        }
        debug!("ledger channel closed, writer exiting");
    }

    async fn write(&self, msg: &LedgerMsg) {
        for sink in &self.sinks {
            if let Err(e) = sink.write_ledger(&msg.ledger, &msg.summary).await {
                error!(
                    sink = sink.name(),
                    participant_id = %msg.ledger.participant_id,
                    kind = %e.kind(),
                    "Ledger write error: {e}"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ScoreLedgerRow;
    use crate::db::test_pool;
    use crate::types::{Increment, LedgerRow};
    use chrono::{Duration, TimeZone, Utc};

    fn msg(participant: &str, hour: u32, overall: f64) -> LedgerMsg {
        let evaluated_at = Utc.with_ymd_and_hms(2024, 11, 22, hour, 0, 0).unwrap();
        LedgerMsg {
            ledger: ScoreLedger {
                participant_id: participant.to_string(),
                evaluated_at,
                rows: vec![LedgerRow {
                    label: "Overall".into(),
                    increment: Increment::Total,
                    score: overall,
                }],
            },
            summary: ScoreSummary {
                participant_id: participant.to_string(),
                per_horizon_total: vec![],
                overall_total: overall,
            },
        }
    }

    async fn stored(pool: &sqlx::SqlitePool) -> Vec<ScoreLedgerRow> {
        sqlx::query_as(
            "SELECT participant_id, day, evaluated_at, overall_total, rows_json \
             FROM score_ledgers ORDER BY participant_id, day",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn latest_cycle_overwrites_same_day() {
        let pool = test_pool().await;
        let sink = SqliteReportSink::new(pool.clone());

        let first = msg("miner_123", 1, 10.0);
        let second = msg("miner_123", 2, 7.5);
        sink.write_ledger(&first.ledger, &first.summary).await.unwrap();
        sink.write_ledger(&second.ledger, &second.summary).await.unwrap();

        let rows = stored(&pool).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].day, "2024-11-22");
        assert_eq!(rows[0].overall_total, 7.5);
        assert_eq!(rows[0].rows().unwrap(), second.ledger.rows);
    }

    #[tokio::test]
    async fn writer_task_drains_channel_in_order() {
        let pool = test_pool().await;
        let health = Arc::new(HealthState::new());
        let (tx, rx) = mpsc::channel(16);
        let sinks: Vec<Arc<dyn ReportSink>> = vec![Arc::new(SqliteReportSink::new(pool.clone()))];
        let writer = LedgerWriter::new(sinks, rx, Arc::clone(&health));

        let mut next_day = msg("b", 3, 1.0);
        next_day.ledger.evaluated_at = next_day.ledger.evaluated_at + Duration::days(1);
        for m in [msg("a", 1, 3.0), msg("a", 2, 2.0), msg("b", 1, 4.0), next_day] {
            health.inc_write_queue_pending();
            tx.send(m).await.unwrap();
        }
        drop(tx);
        writer.run().await;

        let rows = stored(&pool).await;
        let got: Vec<(String, String, f64)> = rows
            .into_iter()
            .map(|r| (r.participant_id, r.day, r.overall_total))
            .collect();
        assert_eq!(
            got,
            vec![
                ("a".to_string(), "2024-11-22".to_string(), 2.0),
                ("b".to_string(), "2024-11-22".to_string(), 4.0),
                ("b".to_string(), "2024-11-23".to_string(), 1.0),
            ]
        );
        assert_eq!(health.write_queue_pending(), 0);
    }
}
