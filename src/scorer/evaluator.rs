use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::ScoringLatency;
use crate::db::LedgerMsg;
use crate::error::{AppError, Result};
use crate::scorer::CrpsScorer;
use crate::selector::{horizon_end, select_eligible, SelectionPolicy};
use crate::state::{ForecastStore, RealizedPriceSource};
use crate::types::{ScoreSummary, Timestamp};

/// What one participant contributed to a cycle.
#[derive(Debug)]
pub enum Outcome {
    Scored(LedgerMsg),
    /// No forecast matured inside the lookback window.
    NoEligible,
    /// The store could not be read; treated as no contribution.
    ReadFailed(AppError),
    /// Realized prices or scoring failed for this participant only.
    Failed(AppError),
}

/// Result of one evaluation cycle, kept for the API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub evaluated_at: Option<Timestamp>,
    /// Sorted by participant id.
    pub summaries: Vec<ScoreSummary>,
    pub no_eligible: usize,
    pub failed: usize,
}

/// Background task that scores every participant on a fixed interval.
/// Each participant is one `records_for` read, one selection and one CRPS
/// run; up to `workers` participants are in flight at once.
pub struct Evaluator {
    store: Arc<dyn ForecastStore>,
    prices: Arc<dyn RealizedPriceSource>,
    scorer: CrpsScorer,
    policy: SelectionPolicy,
    asset: String,
    workers: usize,
    interval: Duration,
    ledger_tx: mpsc::Sender<LedgerMsg>,
    health: Arc<HealthState>,
    latency: Arc<ScoringLatency>,
    latest: Arc<RwLock<CycleReport>>,
}

impl Evaluator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ForecastStore>,
        prices: Arc<dyn RealizedPriceSource>,
        scorer: CrpsScorer,
        policy: SelectionPolicy,
        asset: String,
        workers: usize,
        interval: Duration,
        ledger_tx: mpsc::Sender<LedgerMsg>,
        health: Arc<HealthState>,
        latency: Arc<ScoringLatency>,
    ) -> Self {
        Self {
            store,
            prices,
            scorer,
            policy,
            asset,
            workers: workers.max(1),
            interval,
            ledger_tx,
            health,
            latency,
            latest: Arc::new(RwLock::new(CycleReport::default())),
        }
    }

    /// Shared handle to the most recent cycle's report.
    pub fn latest(&self) -> Arc<RwLock<CycleReport>> {
        Arc::clone(&self.latest)
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // First tick completes immediately: score once at startup.
        loop {
            interval.tick().await;
            if let Err(e) = self.evaluate_cycle(Utc::now()).await {
                error!(kind = %e.kind(), "Evaluation cycle error: {e}");
            }
        }
    }

    pub async fn evaluate_cycle(&self, now: Timestamp) -> Result<CycleReport> {
        let started = Instant::now();
        let participants = self.store.participants().await?;

        let outcomes: Vec<(String, Outcome)> = stream::iter(participants)
            .map(|id| async move {
                let outcome = self.evaluate_participant(&id, now).await;
                (id, outcome)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut report = CycleReport {
            evaluated_at: Some(now),
            ..CycleReport::default()
        };
        for (participant_id, outcome) in outcomes {
            match outcome {
                Outcome::Scored(msg) => {
                    report.summaries.push(msg.summary.clone());
                    self.health.inc_write_queue_pending();
                    if let Err(e) = self.ledger_tx.send(msg).await {
                        self.health.dec_write_queue_pending();
                        warn!(%participant_id, "Ledger channel closed: {e}");
                    }
                }
                Outcome::NoEligible => report.no_eligible += 1,
                Outcome::ReadFailed(e) | Outcome::Failed(e) => {
                    report.failed += 1;
                    warn!(%participant_id, kind = %e.kind(), "No score this cycle: {e}");
                }
            }
        }
        report
            .summaries
            .sort_by(|a, b| a.participant_id.cmp(&b.participant_id));

        self.health
            .record_cycle(now.timestamp_millis(), report.summaries.len() as u64);
        if let Ok(mut latest) = self.latest.write() {
            *latest = report.clone();
        }

        info!(
            scored = report.summaries.len(),
            no_eligible = report.no_eligible,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Evaluation cycle complete: {} scored, {} without eligible forecast, {} failed",
            report.summaries.len(),
            report.no_eligible,
            report.failed,
        );
        Ok(report)
    }

    pub async fn evaluate_participant(&self, participant_id: &str, now: Timestamp) -> Outcome {
        let started = Instant::now();

        // A failed read must never fall back to stale data: no contribution instead.
        let records = match self.store.records_for(participant_id).await {
            Ok(records) => records,
            Err(e) => return Outcome::ReadFailed(e),
        };

        let Some(record) = select_eligible(&records, now, &self.policy) else {
            debug!(participant_id, records = records.len(), "no eligible forecast");
            return Outcome::NoEligible;
        };

        let realized = match self
            .prices
            .realized_path(&self.asset, &record.timeline())
            .await
        {
            Ok(path) => path,
            Err(e) => return Outcome::Failed(e),
        };

        let (ledger, summary) = match self.scorer.score(participant_id, now, &record.paths, &realized)
        {
            Ok(scored) => scored,
            Err(e) => return Outcome::Failed(e),
        };
        self.latency.record(started.elapsed());

        debug!(
            participant_id,
            seq = record.seq,
            horizon_end = ?horizon_end(record, &self.policy),
            ensemble_size = record.ensemble_size(),
            overall_total = summary.overall_total,
            "forecast scored"
        );
        Outcome::Scored(LedgerMsg { ledger, summary })
    }
}
