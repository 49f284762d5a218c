use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;

use crate::error::{AppError, Result};
use crate::types::{ForecastRecord, PricePath, Timestamp};

// ---------------------------------------------------------------------------
// ForecastStore
// ---------------------------------------------------------------------------

/// Append-only log of forecast ensembles, keyed by participant.
///
/// Implementations must make an appended record visible atomically: a
/// concurrent reader either sees the whole record or nothing. Records are
/// never altered or removed through this interface.
#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Validate and append one ensemble. Returns the stored record with its
    /// assigned `seq`. On a validation error nothing is persisted.
    async fn append(
        &self,
        participant_id: &str,
        submitted_at: Timestamp,
        paths: Vec<PricePath>,
    ) -> Result<Arc<ForecastRecord>>;

    /// Every record ever appended for `participant_id`, in no particular order.
    async fn records_for(&self, participant_id: &str) -> Result<Vec<Arc<ForecastRecord>>>;

    /// Distinct participants with at least one record.
    async fn participants(&self) -> Result<Vec<String>>;
}

/// Checks an ensemble before it is stored.
///
/// Every path must be non-empty, strictly increasing at exactly `cadence`,
/// with finite non-negative prices, and all paths must share one timeline.
pub fn validate_paths(paths: &[PricePath], cadence: Duration) -> Result<()> {
    let Some(reference) = paths.first() else {
        return Err(AppError::Validation("ensemble has no paths".to_string()));
    };
    if reference.is_empty() {
        return Err(AppError::Validation("path 0 has no points".to_string()));
    }

    for (i, pair) in reference.windows(2).enumerate() {
        let gap = pair[1].time - pair[0].time;
        if gap <= Duration::zero() {
            return Err(AppError::Validation(format!(
                "path 0 not strictly increasing at point {}",
                i + 1
            )));
        }
        if gap != cadence {
            return Err(AppError::Validation(format!(
                "path 0 spacing {}s at point {} does not match cadence {}s",
                gap.num_seconds(),
                i + 1,
                cadence.num_seconds()
            )));
        }
    }

    for (p, path) in paths.iter().enumerate() {
        if path.len() != reference.len() {
            return Err(AppError::Validation(format!(
                "path {p} has {} points, path 0 has {}",
                path.len(),
                reference.len()
            )));
        }
        for (i, (pt, ref_pt)) in path.iter().zip(reference).enumerate() {
            if pt.time != ref_pt.time {
                return Err(AppError::Validation(format!(
                    "path {p} point {i} at {} is off the shared timeline",
                    pt.time.to_rfc3339()
                )));
            }
            if !pt.price.is_finite() || pt.price < 0.0 {
                return Err(AppError::Validation(format!(
                    "path {p} point {i} has invalid price {}",
                    pt.price
                )));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// MemoryForecastStore
// ---------------------------------------------------------------------------

/// In-process store. Each participant's log lives in one map entry; the
/// push happens under the shard write lock, so readers cloning the log
/// never observe a half-written record.
pub struct MemoryForecastStore {
    cadence: Duration,
    /// participant_id → records in append order
    logs: DashMap<String, Vec<Arc<ForecastRecord>>>,
    next_seq: AtomicU64,
}

impl MemoryForecastStore {
    pub fn new(cadence: Duration) -> Arc<Self> {
        Arc::new(Self {
            cadence,
            logs: DashMap::new(),
            next_seq: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl ForecastStore for MemoryForecastStore {
    async fn append(
        &self,
        participant_id: &str,
        submitted_at: Timestamp,
        paths: Vec<PricePath>,
    ) -> Result<Arc<ForecastRecord>> {
        validate_paths(&paths, self.cadence)?;

        let mut log = self.logs.entry(participant_id.to_string()).or_default();
        // seq is taken under the entry lock so per-participant order matches seq order.
        let record = Arc::new(ForecastRecord {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            participant_id: participant_id.to_string(),
            submitted_at,
            paths,
        });
        log.push(Arc::clone(&record));
        Ok(record)
    }

    async fn records_for(&self, participant_id: &str) -> Result<Vec<Arc<ForecastRecord>>> {
        Ok(self
            .logs
            .get(participant_id)
            .map(|log| log.value().clone())
            .unwrap_or_default())
    }

    async fn participants(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.logs.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
