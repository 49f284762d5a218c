//! Shared health state for the /health endpoint.
//! Updated by the Evaluator and LedgerWriter.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Shared health metrics. Updated by validator components, read by API.
#[derive(Default)]
pub struct HealthState {
    /// Epoch ms of the last completed evaluation cycle (0 = none yet).
    pub last_cycle_at_ms: AtomicI64,
    pub cycles_completed: AtomicU64,
    /// Participants that produced a ledger in the last cycle.
    pub last_cycle_scored: AtomicU64,
    /// Ledgers queued for the writer but not yet written.
    pub write_queue_pending: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self, at_ms: i64, scored: u64) {
        self.last_cycle_at_ms.store(at_ms, Ordering::Relaxed);
        self.last_cycle_scored.store(scored, Ordering::Relaxed);
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_write_queue_pending(&self) {
        self.write_queue_pending.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_write_queue_pending(&self) {
        // Saturating: a writer started before any increment must not wrap.
        let _ = self
            .write_queue_pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }

    pub fn last_cycle_at_ms(&self) -> i64 {
        self.last_cycle_at_ms.load(Ordering::Relaxed)
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn last_cycle_scored(&self) -> u64 {
        self.last_cycle_scored.load(Ordering::Relaxed)
    }

    pub fn write_queue_pending(&self) -> u64 {
        self.write_queue_pending.load(Ordering::Relaxed)
    }
}
