use std::sync::{Arc, RwLock};

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::api::latency::{LatencySnapshot, ScoringLatency};
use crate::db::models::{from_epoch_ms, ScoreLedgerRow};
use crate::error::AppError;
use crate::scorer::CycleReport;
use crate::types::{LedgerRow, Timestamp};

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub health: Arc<HealthState>,
    pub latency: Arc<ScoringLatency>,
    pub latest: Arc<RwLock<CycleReport>>,
}

/// Read-only views over stored ledgers and the last cycle.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/participants/:id/ledger", get(get_participant_ledger))
        .route("/scores/latest", get(get_latest_scores))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LedgerQuery {
    /// YYYY-MM-DD; latest stored day when omitted.
    pub day: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cycles_completed: u64,
    pub last_cycle_at: Option<Timestamp>,
    pub last_cycle_scored: u64,
    pub write_queue_pending: u64,
}

#[derive(Serialize)]
pub struct LedgerResponse {
    pub participant_id: String,
    pub day: String,
    pub evaluated_at: Timestamp,
    pub overall_total: f64,
    pub rows: Vec<LedgerRow>,
}

impl TryFrom<ScoreLedgerRow> for LedgerResponse {
    type Error = AppError;

    fn try_from(row: ScoreLedgerRow) -> Result<Self, AppError> {
        let rows = row.rows()?;
        Ok(Self {
            participant_id: row.participant_id,
            day: row.day,
            evaluated_at: from_epoch_ms(row.evaluated_at)?,
            overall_total: row.overall_total,
            rows,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let h = &state.health;
    let last_ms = h.last_cycle_at_ms();
    Json(HealthResponse {
        status: if h.cycles_completed() > 0 { "ok" } else { "starting" },
        cycles_completed: h.cycles_completed(),
        last_cycle_at: if last_ms > 0 { from_epoch_ms(last_ms).ok() } else { None },
        last_cycle_scored: h.last_cycle_scored(),
        write_queue_pending: h.write_queue_pending(),
    })
}

async fn get_participant_ledger(
    State(state): State<ApiState>,
    Path(participant_id): Path<String>,
    Query(params): Query<LedgerQuery>,
) -> Result<Json<LedgerResponse>, AppError> {
    let row: Option<ScoreLedgerRow> = match params.day.as_deref() {
        Some(day) => {
            chrono::NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map_err(|_| AppError::InvalidInput(format!("day must be YYYY-MM-DD, got {day:?}")))?;
            sqlx::query_as(
                r#"
                SELECT participant_id, day, evaluated_at, overall_total, rows_json
                FROM score_ledgers
                WHERE participant_id = ? AND day = ?
                "#,
            )
            .bind(&participant_id)
            .bind(day)
            .fetch_optional(&state.pool)
            .await?
        }
        None => {
            sqlx::query_as(
                r#"
                SELECT participant_id, day, evaluated_at, overall_total, rows_json
                FROM score_ledgers
                WHERE participant_id = ?
                ORDER BY day DESC
                LIMIT 1
                "#,
            )
            .bind(&participant_id)
            .fetch_optional(&state.pool)
            .await?
        }
    };

    let row = row.ok_or_else(|| AppError::NotFound(format!("no ledger for {participant_id}")))?;
    Ok(Json(LedgerResponse::try_from(row)?))
}

async fn get_latest_scores(State(state): State<ApiState>) -> Json<CycleReport> {
    let report = state
        .latest
        .read()
        .map(|r| r.clone())
        .unwrap_or_default();
    Json(report)
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}
